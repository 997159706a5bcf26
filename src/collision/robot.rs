//! Robot geometry and the self-collision check.

use std::collections::BTreeSet;
use std::sync::Arc;

use glam::Mat4;
use tracing::{debug, info, warn};

use super::body::CollisionBody;
use super::{check_pair, pair_distance, CollisionConfig, CollisionRequest, CollisionResult};
use super::{LinkTransforms, Placed};
use crate::acm::AllowedCollisionMatrix;
use crate::error::{CollisionError, Result};
use crate::shape::Shape;
use crate::urdf::RobotModel;

/// Extra geometry rigidly bound to a link.
#[derive(Debug, Clone)]
pub struct AttachedBody {
    id: String,
    body: CollisionBody,
    touch_links: BTreeSet<String>,
}

impl AttachedBody {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shapes with poses relative to the parent link.
    pub fn body(&self) -> &CollisionBody {
        &self.body
    }

    /// Links never reported against this body.
    pub fn touch_links(&self) -> &BTreeSet<String> {
        &self.touch_links
    }
}

/// Geometry of one link: its own shapes plus attached bodies.
#[derive(Debug, Clone)]
pub struct LinkGeometry {
    link_name: String,
    body: CollisionBody,
    attached: Vec<AttachedBody>,
}

impl LinkGeometry {
    pub fn link_name(&self) -> &str {
        &self.link_name
    }

    pub fn body(&self) -> &CollisionBody {
        &self.body
    }

    /// Attached bodies in attach order.
    pub fn attached_bodies(&self) -> &[AttachedBody] {
        &self.attached
    }
}

/// One checkable body: a link's own geometry or an attached body.
#[derive(Clone, Copy)]
pub(crate) struct Element<'a> {
    pub name: &'a str,
    pub link: &'a str,
    pub body: &'a CollisionBody,
    /// Set for attached bodies only.
    pub touch_links: Option<&'a BTreeSet<String>>,
}

impl<'a> Element<'a> {
    pub fn touches(&self, name: &str) -> bool {
        self.touch_links.is_some_and(|t| t.contains(name))
    }

    pub fn place<T: LinkTransforms + ?Sized>(&self, state: &T) -> Option<Placed<'a>> {
        match state.link_transform(self.link) {
            Some(transform) => Some(Placed {
                name: self.name,
                body: self.body,
                transform,
            }),
            None => {
                warn!("No transform for link '{}'; skipping '{}'", self.link, self.name);
                None
            }
        }
    }
}

/// Collision geometry for one robot model.
pub struct CollisionRobot {
    model: Arc<RobotModel>,
    config: CollisionConfig,
    /// Same order as the model's links.
    links: Vec<LinkGeometry>,
}

impl CollisionRobot {
    /// Build distance fields for every link shape of `model`.
    pub fn new(model: Arc<RobotModel>, config: CollisionConfig) -> Result<Self> {
        let mut links = Vec::with_capacity(model.link_names().len());
        for name in model.link_names() {
            let shapes = model.link_shapes(name).unwrap_or_default();
            let body = CollisionBody::from_shapes(shapes.iter().cloned(), &config)?;
            debug!("Link '{}': {} collision shapes", name, body.shapes().len());
            links.push(LinkGeometry {
                link_name: name.clone(),
                body,
                attached: Vec::new(),
            });
        }

        info!(
            "Collision robot '{}' ready: {} links",
            model.name(),
            links.len()
        );

        Ok(Self {
            model,
            config,
            links,
        })
    }

    pub fn model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    pub fn link_geometry(&self, link: &str) -> Option<&LinkGeometry> {
        self.links.iter().find(|g| g.link_name == link)
    }

    fn link_geometry_mut(&mut self, link: &str) -> Result<&mut LinkGeometry> {
        self.links
            .iter_mut()
            .find(|g| g.link_name == link)
            .ok_or_else(|| CollisionError::link_not_found(link))
    }

    pub fn attached_body(&self, link: &str, id: &str) -> Option<&AttachedBody> {
        self.link_geometry(link)?
            .attached
            .iter()
            .find(|a| a.id == id)
    }

    /// Attach shapes to `link`, replacing any body with the same id there.
    ///
    /// `poses` are relative to the link frame. Nothing changes on error.
    pub fn attach_body<I, S>(
        &mut self,
        link: &str,
        id: &str,
        shapes: Vec<Shape>,
        poses: Vec<Mat4>,
        touch_links: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.model.has_link(link) {
            return Err(CollisionError::link_not_found(link));
        }
        if shapes.is_empty() {
            return Err(CollisionError::Geometry(format!(
                "attached body '{}' has no shapes",
                id
            )));
        }
        if shapes.len() != poses.len() {
            return Err(CollisionError::Geometry(format!(
                "attached body '{}' has {} shapes but {} poses",
                id,
                shapes.len(),
                poses.len()
            )));
        }

        let body = CollisionBody::from_shapes(shapes.into_iter().zip(poses), &self.config)?;
        let attached = AttachedBody {
            id: id.to_string(),
            body,
            touch_links: touch_links.into_iter().map(Into::into).collect(),
        };

        let geometry = self.link_geometry_mut(link)?;
        match geometry.attached.iter_mut().find(|a| a.id == id) {
            Some(existing) => *existing = attached,
            None => geometry.attached.push(attached),
        }
        info!("Attached body '{}' to link '{}'", id, link);
        Ok(())
    }

    /// Remove one attached body from `link`.
    pub fn clear_attached_body(&mut self, link: &str, id: &str) -> Result<()> {
        let geometry = self.link_geometry_mut(link)?;
        let index = geometry
            .attached
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| CollisionError::attached_body_not_found(id))?;
        geometry.attached.remove(index);
        info!("Detached body '{}' from link '{}'", id, link);
        Ok(())
    }

    /// Remove every attached body from `link`. Returns how many were removed.
    pub fn clear_attached_bodies(&mut self, link: &str) -> Result<usize> {
        let geometry = self.link_geometry_mut(link)?;
        let removed = geometry.attached.len();
        geometry.attached.clear();
        if removed > 0 {
            info!("Detached {} bodies from link '{}'", removed, link);
        }
        Ok(removed)
    }

    /// Checkable elements of a group in the group's link order; each link is
    /// followed by its attached bodies.
    pub(crate) fn elements(&self, group: &str) -> Result<Vec<Element<'_>>> {
        let names = if group.is_empty() {
            self.model.link_names()
        } else {
            self.model
                .group_links(group)
                .ok_or_else(|| CollisionError::InvalidRequest {
                    group: group.to_string(),
                })?
        };

        let mut elements = Vec::new();
        for name in names {
            let Some(geometry) = self.link_geometry(name) else {
                continue;
            };
            if !geometry.body.is_empty() {
                elements.push(Element {
                    name: &geometry.link_name,
                    link: &geometry.link_name,
                    body: &geometry.body,
                    touch_links: None,
                });
            }
            for attached in &geometry.attached {
                elements.push(Element {
                    name: &attached.id,
                    link: &geometry.link_name,
                    body: &attached.body,
                    touch_links: Some(&attached.touch_links),
                });
            }
        }
        Ok(elements)
    }

    /// Whether a pair of elements is exempt from the self check.
    fn skip_pair(&self, a: &Element<'_>, b: &Element<'_>, acm: &AllowedCollisionMatrix) -> bool {
        match (a.touch_links.is_some(), b.touch_links.is_some()) {
            (true, true) if a.link == b.link => return true,
            (true, false) if a.touches(b.name) => return true,
            (false, true) if b.touches(a.name) => return true,
            // Adjacent links are only checked on an explicit request
            (false, false)
                if self.model.are_adjacent(a.name, b.name)
                    && acm.get_explicit_entry(a.name, b.name) != Some(false) =>
            {
                return true
            }
            _ => {}
        }
        acm.get_entry(a.name, b.name)
    }

    /// Element pairs that survive adjacency, ACM and touch-link filtering,
    /// in enumeration order.
    fn candidate_pairs<'a>(
        &self,
        elements: &[Element<'a>],
        acm: &AllowedCollisionMatrix,
    ) -> Vec<(Element<'a>, Element<'a>)> {
        let mut pairs = Vec::new();
        for (i, a) in elements.iter().enumerate() {
            for b in &elements[i + 1..] {
                if !self.skip_pair(a, b, acm) {
                    pairs.push((*a, *b));
                }
            }
        }
        pairs
    }

    /// Check the robot against itself, adding to `result`.
    ///
    /// `result` is untouched if the request names an unknown group.
    pub fn check_self_collision<T: LinkTransforms + ?Sized>(
        &self,
        request: &CollisionRequest,
        result: &mut CollisionResult,
        state: &T,
        acm: &AllowedCollisionMatrix,
    ) -> Result<()> {
        let elements = self.elements(&request.group_name)?;
        if result.is_done(request) {
            return Ok(());
        }

        for (a, b) in self.candidate_pairs(&elements, acm) {
            let (Some(pa), Some(pb)) = (a.place(state), b.place(state)) else {
                continue;
            };
            if check_pair(pa, pb, request, result) {
                break;
            }
        }
        Ok(())
    }

    /// Smallest sampled signed distance over the pairs the self check would
    /// evaluate. `f32::INFINITY` when no pair survives filtering.
    pub fn distance_self<T: LinkTransforms + ?Sized>(
        &self,
        request: &CollisionRequest,
        state: &T,
        acm: &AllowedCollisionMatrix,
    ) -> Result<f32> {
        let elements = self.elements(&request.group_name)?;
        let mut best = f32::INFINITY;
        for (a, b) in self.candidate_pairs(&elements, acm) {
            if let (Some(pa), Some(pb)) = (a.place(state), b.place(state)) {
                best = best.min(pair_distance(pa, pb));
            }
        }
        Ok(best)
    }
}
