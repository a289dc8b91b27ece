//! Building device trees from profile documents.

use super::{DeviceId, DeviceTree};
use crate::{Device, TopologyError};
use cec_profile::{join, Profile};
use tracing::debug;

impl DeviceTree {
    /// Build a tree from the node at `prefix` and its declared children.
    ///
    /// `prefix` names a node such as `hdmicec/device_map/0`; its children live
    /// under `<prefix>/children/<i>`.
    pub fn from_profile(profile: &Profile, prefix: &str) -> Result<Self, TopologyError> {
        let (root, declared) = Device::from_profile(profile, prefix)?;
        check_child_count(profile, prefix, &root, declared)?;

        let mut tree = DeviceTree::new(root);
        let root = tree.root();
        tree.load_children(root, profile, prefix, declared)?;

        debug!(
            "Loaded device tree from {} with {} device(s)",
            prefix,
            tree.device_count()
        );
        Ok(tree)
    }

    /// Load the node at `prefix` and its declared children under `parent`.
    ///
    /// Nothing is attached when any node of the subtree fails to load.
    pub fn insert_from_profile(
        &mut self,
        parent: DeviceId,
        profile: &Profile,
        prefix: &str,
    ) -> Result<DeviceId, TopologyError> {
        // Staged in a scratch tree so a failure leaves `self` untouched
        let staged = DeviceTree::from_profile(profile, prefix)?;
        for (id, _) in staged.walk(staged.root()) {
            if let Some(device) = staged.device(id) {
                if self.get(&device.name).is_some() {
                    return Err(TopologyError::DuplicateName(device.name.clone()));
                }
            }
        }
        if self.device(parent).is_none() {
            return Err(TopologyError::StaleId);
        }

        self.graft(parent, &staged, staged.root())
    }

    fn load_children(
        &mut self,
        parent: DeviceId,
        profile: &Profile,
        prefix: &str,
        declared: u32,
    ) -> Result<(), TopologyError> {
        for index in 0..declared {
            let child_prefix = join(prefix, &format!("children/{}", index));
            let (child, child_declared) = Device::from_profile(profile, &child_prefix)?;
            check_child_count(profile, &child_prefix, &child, child_declared)?;

            let id = self.insert_child(parent, child)?;
            self.load_children(id, profile, &child_prefix, child_declared)?;
        }
        Ok(())
    }

    fn graft(
        &mut self,
        parent: DeviceId,
        source: &DeviceTree,
        node: DeviceId,
    ) -> Result<DeviceId, TopologyError> {
        let device = source.device(node).cloned().ok_or(TopologyError::StaleId)?;
        let id = self.insert_child(parent, device)?;
        for child in source.children(node) {
            self.graft(id, source, *child)?;
        }
        Ok(id)
    }
}

fn check_child_count(
    profile: &Profile,
    prefix: &str,
    device: &Device,
    declared: u32,
) -> Result<(), TopologyError> {
    let found = profile.len(&join(prefix, "children"));
    if found != declared as usize {
        return Err(TopologyError::ChildCountMismatch {
            name: device.name.clone(),
            declared,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cec_wire::DeviceType;

    const PROFILE: &str = r#"
hdmicec:
  device_map:
    0:
      name: TV
      type: TV
      number_children: 2
      children:
        0:
          name: Soundbar
          type: AudioSystem
          port_id: 1
          number_children: 1
          children:
            0:
              name: Player
              type: PlaybackDevice
              port_id: 1
        1:
          name: Tuner
          type: Tuner
          port_id: 2
"#;

    #[test]
    fn test_from_profile() {
        let profile: Profile = PROFILE.parse().unwrap();
        let tree = DeviceTree::from_profile(&profile, "hdmicec/device_map/0").unwrap();

        assert_eq!(tree.device_count(), 4);
        let root = tree.device(tree.root()).unwrap();
        assert_eq!(root.name, "TV");
        assert_eq!(root.device_type, DeviceType::Tv);

        let children: Vec<_> = tree
            .children(tree.root())
            .iter()
            .map(|id| tree.device(*id).unwrap().name.clone())
            .collect();
        assert_eq!(children, vec!["Soundbar", "Tuner"]);

        let player = tree.get("Player").unwrap();
        assert_eq!(tree.parent(player), tree.get("Soundbar"));
    }

    #[test]
    fn test_child_count_mismatch() {
        let profile: Profile = r#"
root:
  name: TV
  number_children: 2
  children:
    - name: Player
"#
        .parse()
        .unwrap();

        match DeviceTree::from_profile(&profile, "root") {
            Err(TopologyError::ChildCountMismatch {
                name,
                declared,
                found,
            }) => {
                assert_eq!(name, "TV");
                assert_eq!(declared, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_insert_from_profile() {
        let profile: Profile = PROFILE.parse().unwrap();
        let mut tree = DeviceTree::from_profile(&profile, "hdmicec/device_map/0").unwrap();

        let addition: Profile = r#"
name: Recorder
type: RecordingDevice
port_id: 3
number_children: 1
children:
  - name: Console
    type: PlaybackDevice
    port_id: 1
"#
        .parse()
        .unwrap();

        let root = tree.root();
        let id = tree.insert_from_profile(root, &addition, "").unwrap();
        assert_eq!(tree.device(id).unwrap().name, "Recorder");
        assert_eq!(tree.device_count(), 6);
        assert_eq!(tree.parent(tree.get("Console").unwrap()), Some(id));
    }

    #[test]
    fn test_insert_from_profile_is_atomic() {
        let profile: Profile = PROFILE.parse().unwrap();
        let mut tree = DeviceTree::from_profile(&profile, "hdmicec/device_map/0").unwrap();

        let clash: Profile = r#"
name: Recorder
number_children: 1
children:
  - name: Player
"#
        .parse()
        .unwrap();

        let root = tree.root();
        assert!(matches!(
            tree.insert_from_profile(root, &clash, ""),
            Err(TopologyError::DuplicateName(_))
        ));
        assert_eq!(tree.device_count(), 4);
        assert!(tree.get("Recorder").is_none());
    }
}
