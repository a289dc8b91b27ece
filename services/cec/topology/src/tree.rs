//! Arena-backed device tree.
//!
//! Nodes live in a slot vector and are addressed by `DeviceId`, an index
//! paired with the slot generation. Freeing a slot bumps its generation, so an
//! id held across a removal never resolves to the device that reuses the slot.
//! Children are kept in declaration order.

use crate::{Device, TopologyError};
use tracing::debug;

/// Generation-checked handle to a device in a `DeviceTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Node {
    device: Device,
    parent: Option<DeviceId>,
    children: Vec<DeviceId>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// N-ary tree of devices with a single root
#[derive(Debug, Clone)]
pub struct DeviceTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: DeviceId,
}

// Profile loading and address allocation
mod allocation;
mod loader;
pub use allocation::DeviceSnapshot;

impl DeviceTree {
    /// Create a tree holding only `root`
    pub fn new(root: Device) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: DeviceId {
                index: 0,
                generation: 0,
            },
        };
        tree.root = tree.alloc(Node {
            device: root,
            parent: None,
            children: Vec::new(),
        });
        tree
    }

    /// Id of the root device
    pub fn root(&self) -> DeviceId {
        self.root
    }

    /// Number of live devices
    pub fn device_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Device behind `id`
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.node(id).map(|node| &node.device)
    }

    /// Mutable device behind `id`
    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.node_mut(id).map(|node| &mut node.device)
    }

    /// Parent of `id`, `None` for the root or a stale id
    pub fn parent(&self, id: DeviceId) -> Option<DeviceId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Children of `id` in declaration order
    pub fn children(&self, id: DeviceId) -> &[DeviceId] {
        self.node(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Find a device by name.
    ///
    /// Depth-first: a node is checked before its children, and the first
    /// child's whole subtree before the next child.
    pub fn get(&self, name: &str) -> Option<DeviceId> {
        self.walk(self.root)
            .into_iter()
            .map(|(id, _)| id)
            .find(|id| self.device(*id).is_some_and(|device| device.name == name))
    }

    /// Find a device by name and borrow it
    pub fn find(&self, name: &str) -> Option<&Device> {
        self.get(name).and_then(|id| self.device(id))
    }

    /// Whether `id` lies in the subtree rooted at `ancestor` (inclusive)
    pub fn is_within(&self, id: DeviceId, ancestor: DeviceId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Attach `device` as the last child of `parent`
    pub fn insert_child(&mut self, parent: DeviceId, device: Device) -> Result<DeviceId, TopologyError> {
        if self.node(parent).is_none() {
            return Err(TopologyError::StaleId);
        }
        if self.get(&device.name).is_some() {
            return Err(TopologyError::DuplicateName(device.name));
        }

        let id = self.alloc(Node {
            device,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(node) = self.node_mut(parent) {
            node.children.push(id);
        }
        Ok(id)
    }

    /// Detach the device named `name` and purge its whole subtree.
    ///
    /// The removed devices are returned in pre-order so the caller can release
    /// their logical addresses.
    pub fn remove(&mut self, name: &str) -> Result<Vec<Device>, TopologyError> {
        let id = self
            .get(name)
            .ok_or_else(|| TopologyError::NotFound(name.to_string()))?;
        self.remove_subtree(id)
    }

    /// Detach `id` and purge its whole subtree
    pub fn remove_subtree(&mut self, id: DeviceId) -> Result<Vec<Device>, TopologyError> {
        if id == self.root {
            return Err(TopologyError::RootRemoval);
        }
        let parent = self.parent(id).ok_or(TopologyError::StaleId)?;

        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|child| *child != id);
        }

        let mut removed = Vec::new();
        for (member, _) in self.walk(id) {
            if let Some(node) = self.release(member) {
                removed.push(node.device);
            }
        }

        debug!("Removed {} device(s) from the tree", removed.len());
        Ok(removed)
    }

    /// Pre-order walk of the subtree at `start`, with depth relative to it
    pub fn walk(&self, start: DeviceId) -> Vec<(DeviceId, usize)> {
        let mut order = Vec::new();
        let mut stack = vec![(start, 0)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            order.push((id, depth));
            // Reverse so the first child is visited first
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }
        order
    }

    fn node(&self, id: DeviceId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: DeviceId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: Node) -> DeviceId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                DeviceId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                DeviceId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    fn release(&mut self, id: DeviceId) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cec_wire::DeviceType;

    fn sample_tree() -> DeviceTree {
        let mut tree = DeviceTree::new(Device::new("TV", DeviceType::Tv));
        let root = tree.root();
        let avr = tree
            .insert_child(root, Device::new("Soundbar", DeviceType::AudioSystem).with_port(1))
            .unwrap();
        tree.insert_child(avr, Device::new("Player", DeviceType::Playback).with_port(1))
            .unwrap();
        tree.insert_child(root, Device::new("Tuner", DeviceType::Tuner).with_port(2))
            .unwrap();
        tree
    }

    #[test]
    fn test_depth_first_lookup() {
        let tree = sample_tree();
        let names: Vec<_> = tree
            .walk(tree.root())
            .into_iter()
            .map(|(id, depth)| (tree.device(id).unwrap().name.clone(), depth))
            .collect();

        assert_eq!(
            names,
            vec![
                ("TV".to_string(), 0),
                ("Soundbar".to_string(), 1),
                ("Player".to_string(), 2),
                ("Tuner".to_string(), 1),
            ]
        );
        assert!(tree.get("Player").is_some());
        assert!(tree.get("Nobody").is_none());
    }

    #[test]
    fn test_remove_purges_subtree() {
        let mut tree = sample_tree();
        let player = tree.get("Player").unwrap();

        let removed = tree.remove("Soundbar").unwrap();
        let names: Vec<_> = removed.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Soundbar", "Player"]);

        assert_eq!(tree.device_count(), 2);
        assert!(tree.find("Player").is_none());
        assert!(tree.device(player).is_none());
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[test]
    fn test_stale_ids_do_not_resolve() {
        let mut tree = sample_tree();
        let tuner = tree.get("Tuner").unwrap();
        tree.remove("Tuner").unwrap();

        let root = tree.root();
        let reused = tree
            .insert_child(root, Device::new("Recorder", DeviceType::Recorder))
            .unwrap();
        assert!(tree.device(tuner).is_none());
        assert_eq!(tree.device(reused).unwrap().name, "Recorder");
    }

    #[test]
    fn test_remove_errors() {
        let mut tree = sample_tree();
        assert!(matches!(tree.remove("TV"), Err(TopologyError::RootRemoval)));
        assert!(matches!(tree.remove("Nobody"), Err(TopologyError::NotFound(_))));

        let root = tree.root();
        assert!(matches!(
            tree.insert_child(root, Device::new("Tuner", DeviceType::Tuner)),
            Err(TopologyError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_is_within() {
        let tree = sample_tree();
        let avr = tree.get("Soundbar").unwrap();
        let player = tree.get("Player").unwrap();
        let tuner = tree.get("Tuner").unwrap();

        assert!(tree.is_within(player, avr));
        assert!(tree.is_within(avr, avr));
        assert!(!tree.is_within(tuner, avr));
        assert!(tree.is_within(tuner, tree.root()));
    }
}
