//! Robot model
//!
//! Kinematic structure and collision geometry of an articulated robot.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use anyhow::{bail, Result};
use glam::{Mat4, Vec3};

use crate::acm::pair_key;
use crate::shape::Shape;

/// Joint kinds supported by forward kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointType {
    Fixed,
    Revolute,
    Continuous,
    Prismatic,
}

/// Joint information.
#[derive(Debug, Clone)]
pub struct JointInfo {
    /// Joint name.
    pub name: String,
    pub joint_type: JointType,
    /// Parent link name.
    pub parent_link: String,
    /// Child link name.
    pub child_link: String,
    /// Joint origin transform relative to the parent link.
    pub origin: Mat4,
    /// Rotation or translation axis in the joint frame.
    pub axis: Vec3,
    /// Lower position limit.
    pub lower: f32,
    /// Upper position limit.
    pub upper: f32,
}

impl JointInfo {
    pub fn fixed(name: &str, parent: &str, child: &str, origin: Mat4) -> Self {
        Self {
            name: name.to_string(),
            joint_type: JointType::Fixed,
            parent_link: parent.to_string(),
            child_link: child.to_string(),
            origin,
            axis: Vec3::Z,
            lower: 0.0,
            upper: 0.0,
        }
    }

    pub fn revolute(
        name: &str,
        parent: &str,
        child: &str,
        origin: Mat4,
        axis: Vec3,
        limits: (f32, f32),
    ) -> Self {
        Self {
            joint_type: JointType::Revolute,
            axis,
            lower: limits.0,
            upper: limits.1,
            ..Self::fixed(name, parent, child, origin)
        }
    }

    pub fn prismatic(
        name: &str,
        parent: &str,
        child: &str,
        origin: Mat4,
        axis: Vec3,
        limits: (f32, f32),
    ) -> Self {
        Self {
            joint_type: JointType::Prismatic,
            ..Self::revolute(name, parent, child, origin, axis, limits)
        }
    }

    /// Value used by `RobotState::set_to_default_values`: zero when it is
    /// within limits, otherwise the middle of the range.
    pub fn default_position(&self) -> f32 {
        match self.joint_type {
            JointType::Fixed | JointType::Continuous => 0.0,
            JointType::Revolute | JointType::Prismatic => {
                if self.lower <= 0.0 && 0.0 <= self.upper {
                    0.0
                } else {
                    (self.lower + self.upper) * 0.5
                }
            }
        }
    }

    /// Transform from the parent link frame to the child link frame.
    pub fn child_transform(&self, position: f32) -> Mat4 {
        let motion = match self.joint_type {
            JointType::Fixed => Mat4::IDENTITY,
            JointType::Revolute | JointType::Continuous => Mat4::from_axis_angle(
                self.axis.try_normalize().unwrap_or(Vec3::Z),
                position,
            ),
            JointType::Prismatic => {
                Mat4::from_translation(self.axis.try_normalize().unwrap_or(Vec3::Z) * position)
            }
        };
        self.origin * motion
    }
}

/// Collision geometry attached to a link frame.
pub type LinkShapes = Vec<(Shape, Mat4)>;

/// Kinematic tree with per-link collision geometry and named link groups.
#[derive(Debug, Clone)]
pub struct RobotModel {
    name: String,
    root_link: String,
    link_names: Vec<String>,
    link_shapes: HashMap<String, LinkShapes>,
    /// Ordered so every parent is placed before its children.
    joints: Vec<JointInfo>,
    groups: BTreeMap<String, Vec<String>>,
    adjacent: HashSet<(String, String)>,
}

impl RobotModel {
    pub fn builder(name: &str) -> RobotModelBuilder {
        RobotModelBuilder {
            name: name.to_string(),
            links: Vec::new(),
            joints: Vec::new(),
            groups: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_link(&self) -> &str {
        &self.root_link
    }

    /// Link names in declaration order.
    pub fn link_names(&self) -> &[String] {
        &self.link_names
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.link_shapes.contains_key(name)
    }

    /// Collision shapes of a link with poses relative to the link frame.
    pub fn link_shapes(&self, name: &str) -> Option<&[(Shape, Mat4)]> {
        self.link_shapes.get(name).map(Vec::as_slice)
    }

    /// Joints in topological order.
    pub fn joints(&self) -> &[JointInfo] {
        &self.joints
    }

    pub fn joint(&self, name: &str) -> Option<&JointInfo> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Links of a named group in their declared order.
    pub fn group_links(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Whether two links are connected by a joint (parent and child).
    #[inline]
    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.adjacent.contains(&pair_key(a, b))
    }
}

/// Incremental construction of a [`RobotModel`].
pub struct RobotModelBuilder {
    name: String,
    links: Vec<(String, LinkShapes)>,
    joints: Vec<JointInfo>,
    groups: BTreeMap<String, Vec<String>>,
}

impl RobotModelBuilder {
    /// Add a link with its collision shapes (may be empty).
    pub fn link(mut self, name: &str, shapes: LinkShapes) -> Self {
        self.links.push((name.to_string(), shapes));
        self
    }

    pub fn joint(mut self, joint: JointInfo) -> Self {
        self.joints.push(joint);
        self
    }

    pub fn group<I, S>(mut self, name: &str, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(name.to_string(), links.into_iter().map(Into::into).collect());
        self
    }

    /// Validate the tree and order joints parent-first.
    pub fn build(self) -> Result<RobotModel> {
        if self.links.is_empty() {
            bail!("robot '{}' has no links", self.name);
        }

        let mut link_shapes = HashMap::with_capacity(self.links.len());
        let mut link_names = Vec::with_capacity(self.links.len());
        for (name, shapes) in self.links {
            if link_shapes.insert(name.clone(), shapes).is_some() {
                bail!("duplicate link '{}'", name);
            }
            link_names.push(name);
        }

        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for joint in &self.joints {
            for link in [&joint.parent_link, &joint.child_link] {
                if !link_shapes.contains_key(link) {
                    bail!("joint '{}' references unknown link '{}'", joint.name, link);
                }
            }
            if parent_of
                .insert(joint.child_link.as_str(), joint.parent_link.as_str())
                .is_some()
            {
                bail!("link '{}' has more than one parent joint", joint.child_link);
            }
        }

        let roots: Vec<&String> = link_names
            .iter()
            .filter(|l| !parent_of.contains_key(l.as_str()))
            .collect();
        let root_link = match roots.as_slice() {
            [root] => (*root).clone(),
            [] => bail!("robot '{}' has no root link (joint cycle)", self.name),
            _ => bail!(
                "robot '{}' has {} root links; expected one",
                self.name,
                roots.len()
            ),
        };

        // Breadth-first from the root so parents precede children
        let mut ordered = Vec::with_capacity(self.joints.len());
        let mut queue = VecDeque::from([root_link.clone()]);
        while let Some(link) = queue.pop_front() {
            for joint in self.joints.iter().filter(|j| j.parent_link == link) {
                queue.push_back(joint.child_link.clone());
                ordered.push(joint.clone());
            }
        }
        if ordered.len() != self.joints.len() {
            bail!("robot '{}' joint graph is not a tree", self.name);
        }

        for (group, links) in &self.groups {
            if let Some(missing) = links.iter().find(|l| !link_shapes.contains_key(*l)) {
                bail!("group '{}' references unknown link '{}'", group, missing);
            }
        }

        let adjacent = ordered
            .iter()
            .map(|j| pair_key(&j.parent_link, &j.child_link))
            .collect();

        Ok(RobotModel {
            name: self.name,
            root_link,
            link_names,
            link_shapes,
            joints: ordered,
            groups: self.groups,
            adjacent,
        })
    }
}
