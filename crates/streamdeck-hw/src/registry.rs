//! Discovery of attached panels.

use crate::device::DeviceHandle;
use crate::model::{self, Capabilities};
use crate::{Error, Result, VENDOR_ID};
use hidapi::HidApi;
use std::ops::{Index, IndexMut};
use tracing::{debug, info};

/// All panels found at construction time.
///
/// Owns the HID subsystem; dropping (or [`close`](Self::close)) releases
/// every handle before shutting the subsystem down.
pub struct Registry {
    // Field order matters: handles must drop before the API.
    devices: Vec<DeviceHandle>,
    api: Option<HidApi>,
}

/// Pairs enumerated `(product id, path)` entries with known models.
///
/// Unknown product ids are skipped; order is preserved.
pub fn match_devices<P>(
    candidates: impl IntoIterator<Item = (u16, P)>,
) -> Vec<(&'static Capabilities, P)> {
    candidates
        .into_iter()
        .filter_map(|(product_id, path)| match model::lookup(product_id) {
            Some(caps) => Some((caps, path)),
            None => {
                debug!("Skipping unknown product {:04X}", product_id);
                None
            }
        })
        .collect()
}

/// Opens a handle for every recognized candidate with `open`.
///
/// Every matched candidate yields a handle, connected or not.
fn open_devices<P>(
    candidates: impl IntoIterator<Item = (u16, P)>,
    mut open: impl FnMut(&'static Capabilities, P) -> DeviceHandle,
) -> Vec<DeviceHandle> {
    let devices: Vec<DeviceHandle> = match_devices(candidates)
        .into_iter()
        .map(|(caps, path)| open(caps, path))
        .collect();

    info!(
        "Found {} panel(s) (VID:{:04X}), {} connected",
        devices.len(),
        VENDOR_ID,
        devices.iter().filter(|d| d.connected()).count()
    );
    devices
}

impl Registry {
    /// Initializes HID and opens every recognized panel.
    ///
    /// Panels that fail to open are kept as disconnected handles.
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(Error::TransportInit)?;

        let candidates = api
            .device_list()
            .filter(|d| d.vendor_id() == VENDOR_ID)
            .map(|d| (d.product_id(), d.path().to_owned()));

        let devices = open_devices(candidates, |caps, path| {
            DeviceHandle::open(&api, caps, &path)
        });

        Ok(Self {
            devices,
            api: Some(api),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceHandle> {
        self.devices.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DeviceHandle> {
        self.devices.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceHandle> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, DeviceHandle> {
        self.devices.iter_mut()
    }

    /// Closes every handle and shuts down HID. Safe to call more than once.
    pub fn close(&mut self) {
        for device in &mut self.devices {
            device.close();
        }
        self.devices.clear();
        if self.api.take().is_some() {
            debug!("HID subsystem released");
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.close();
    }
}

impl Index<usize> for Registry {
    type Output = DeviceHandle;

    fn index(&self, index: usize) -> &Self::Output {
        &self.devices[index]
    }
}

impl IndexMut<usize> for Registry {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.devices[index]
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a DeviceHandle;
    type IntoIter = std::slice::Iter<'a, DeviceHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut Registry {
    type Item = &'a mut DeviceHandle;
    type IntoIter = std::slice::IterMut<'a, DeviceHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, PRODUCT_MINI, PRODUCT_ORIGINAL_V2, PRODUCT_XL};

    #[test]
    fn test_match_devices() {
        let found = match_devices(vec![
            (PRODUCT_XL, "/dev/hidraw0"),
            (0x0080, "/dev/hidraw1"),
            (PRODUCT_MINI, "/dev/hidraw2"),
            (PRODUCT_ORIGINAL_V2, "/dev/hidraw3"),
        ]);

        let summary: Vec<_> = found.iter().map(|(caps, path)| (caps.model, *path)).collect();
        assert_eq!(
            summary,
            vec![
                (Model::Xl, "/dev/hidraw0"),
                (Model::Mini, "/dev/hidraw2"),
                (Model::OriginalV2, "/dev/hidraw3"),
            ]
        );
    }

    #[test]
    fn test_match_devices_empty() {
        assert!(match_devices(Vec::<(u16, String)>::new()).is_empty());
        assert!(match_devices(vec![(0x1234, ())]).is_empty());
    }

    #[test]
    fn test_failed_open_keeps_handle() {
        let devices = open_devices(
            vec![(PRODUCT_MINI, "/dev/hidraw0"), (0x0080, "/dev/hidraw1")],
            |caps, path| DeviceHandle::new(caps, path, None),
        );
        let mut registry = Registry { devices, api: None };

        assert_eq!(registry.len(), 1);
        assert!(!registry[0].connected());
        assert_eq!(registry[0].model(), Model::Mini);
        assert_eq!(registry[0].path(), "/dev/hidraw0");
        assert!(matches!(
            registry[0].reset(),
            Err(Error::NotConnected(_))
        ));

        registry.close();
        registry.close();
        assert!(registry.is_empty());
        assert!(registry.get(0).is_none());
    }

    // Hardware tests are skipped by default
    #[test]
    #[ignore]
    fn test_registry_open_close() {
        let mut registry = Registry::new().unwrap();
        for device in &registry {
            assert!(device.capabilities().key_count() > 0);
        }
        registry.close();
        registry.close();
        assert!(registry.is_empty());
    }
}
