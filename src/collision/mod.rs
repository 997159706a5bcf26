//! Collision checking against distance fields.
//!
//! - [`CollisionRobot`]: link geometry, attached bodies and the self check
//! - [`CollisionWorld`]: environment objects and the robot-versus-world check
//! - [`CollisionRequest`] / [`CollisionResult`]: per-call query and capped output

mod body;
mod robot;
mod world;

pub use body::{BodyShape, CollisionBody};
pub use robot::{AttachedBody, CollisionRobot, LinkGeometry};
pub use world::{CollisionWorld, WorldObject};

use std::collections::{BTreeMap, HashMap};

use glam::{Mat4, Vec3};
use tracing::info;

use crate::acm::pair_key;
use crate::distance_field::DistanceFieldConfig;

/// Configuration shared by the robot and world checkers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionConfig {
    /// Distance field construction parameters.
    pub field: DistanceFieldConfig,
    /// Spacing of the sample points queried against other bodies' fields.
    /// Default: 0.02.
    pub sample_spacing: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            field: DistanceFieldConfig::default(),
            sample_spacing: 0.02,
        }
    }
}

/// Source of per-link world transforms.
pub trait LinkTransforms {
    /// World transform of `link`, or `None` if the link is unknown.
    fn link_transform(&self, link: &str) -> Option<Mat4>;
}

impl LinkTransforms for HashMap<String, Mat4> {
    fn link_transform(&self, link: &str) -> Option<Mat4> {
        self.get(link).copied()
    }
}

/// A reported collision point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World position of the deepest sampled point.
    pub position: Vec3,
    /// Penetration depth (non-negative).
    pub depth: f32,
    /// Unit normal pointing from the first body of the pair to the second.
    pub normal: Vec3,
}

/// Query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionRequest {
    /// Link group to check. Empty means every link of the robot.
    pub group_name: String,
    /// Whether to report contacts.
    pub contacts: bool,
    /// Total number of contacts to report.
    pub max_contacts: usize,
    /// Contacts reported per pair. Zero is treated as one.
    pub max_contacts_per_pair: usize,
    /// Evaluate every pair instead of stopping at the caps, logging each hit.
    pub verbose: bool,
}

impl Default for CollisionRequest {
    fn default() -> Self {
        Self {
            group_name: String::new(),
            contacts: false,
            max_contacts: 1,
            max_contacts_per_pair: 1,
            verbose: false,
        }
    }
}

impl CollisionRequest {
    pub(crate) fn per_pair_limit(&self) -> usize {
        self.max_contacts_per_pair.max(1)
    }
}

/// Query output. Checkers add to it without clearing it first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionResult {
    pub collision: bool,
    /// Contacts accepted so far. May be lower than the number of colliding
    /// pairs once a cap is reached.
    pub contact_count: usize,
    /// Contacts keyed by pair name, smaller name first, deepest first.
    pub contacts: BTreeMap<(String, String), Vec<Contact>>,
}

impl CollisionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.collision = false;
        self.contact_count = 0;
        self.contacts.clear();
    }

    /// Record a colliding pair, keeping as many contacts as the caps allow.
    pub(crate) fn record(
        &mut self,
        key: (String, String),
        contacts: Vec<Contact>,
        request: &CollisionRequest,
    ) {
        self.collision = true;
        if !request.contacts {
            return;
        }

        let existing = self.contacts.get(&key).map_or(0, Vec::len);
        let room = request
            .per_pair_limit()
            .saturating_sub(existing)
            .min(request.max_contacts.saturating_sub(self.contact_count));
        if room == 0 || contacts.is_empty() {
            return;
        }

        let accepted: Vec<Contact> = contacts.into_iter().take(room).collect();
        self.contact_count += accepted.len();
        self.contacts.entry(key).or_default().extend(accepted);
    }

    /// Whether enumeration can stop.
    pub(crate) fn is_done(&self, request: &CollisionRequest) -> bool {
        !request.verbose
            && self.collision
            && (!request.contacts || self.contact_count >= request.max_contacts)
    }
}

/// A body placed in the world for one query.
#[derive(Clone, Copy)]
pub(crate) struct Placed<'a> {
    pub name: &'a str,
    pub body: &'a CollisionBody,
    pub transform: Mat4,
}

/// Narrow phase for one surviving pair. Returns true when enumeration can stop.
pub(crate) fn check_pair(
    a: Placed<'_>,
    b: Placed<'_>,
    request: &CollisionRequest,
    result: &mut CollisionResult,
) -> bool {
    let (first, second) = if a.name <= b.name { (a, b) } else { (b, a) };

    if !first
        .body
        .aabb(&first.transform)
        .overlaps(&second.body.aabb(&second.transform))
    {
        return false;
    }

    let contacts = if request.contacts || request.verbose {
        let limit = if request.contacts {
            request.per_pair_limit()
        } else {
            1
        };
        let found = body::penetrations(
            first.body,
            &first.transform,
            second.body,
            &second.transform,
            limit,
        );
        if found.is_empty() {
            return false;
        }
        found
    } else if body::intersects(first.body, &first.transform, second.body, &second.transform) {
        // Boolean query: no contact data needed
        Vec::new()
    } else {
        return false;
    };

    if request.verbose {
        if let Some(deepest) = contacts.first() {
            info!(
                "Collision between '{}' and '{}' (depth {:.4})",
                first.name, second.name, deepest.depth
            );
        }
    }

    result.record(pair_key(first.name, second.name), contacts, request);
    result.is_done(request)
}

/// Smallest sampled signed distance between two placed bodies.
pub(crate) fn pair_distance(a: Placed<'_>, b: Placed<'_>) -> f32 {
    body::min_distance(a.body, &a.transform, b.body, &b.transform)
}
