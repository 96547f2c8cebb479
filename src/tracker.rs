//! Hand-off of LED geometry to the optical tracker.

use crate::types::Vec3;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Factory-calibrated IR LED model of one device, in meters in the device frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedGeometry {
    pub positions: Vec<Vec3>,
    pub directions: Vec<Vec3>,
    /// 10-bit blink pattern per LED.
    pub patterns: Vec<u16>,
    /// IMU position, if the device reported one.
    pub imu_position: Option<Vec3>,
}

impl LedGeometry {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Registration token returned by [`Tracker::register_geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(u64);

/// Consumer of LED models. Must tolerate concurrent calls from several sessions.
pub trait Tracker: Send + Sync {
    fn register_geometry(&self, geometry: Arc<LedGeometry>) -> GeometryHandle;

    fn unregister_geometry(&self, handle: GeometryHandle);
}

/// In-process registration table.
#[derive(Default)]
pub struct TrackerRegistry {
    next_id: AtomicU64,
    geometries: RwLock<HashMap<GeometryHandle, Arc<LedGeometry>>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently registered models.
    pub fn geometries(&self) -> Vec<Arc<LedGeometry>> {
        self.geometries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.geometries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Tracker for TrackerRegistry {
    fn register_geometry(&self, geometry: Arc<LedGeometry>) -> GeometryHandle {
        let handle = GeometryHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        log::debug!("Registering {} LEDs as {:?}", geometry.len(), handle);
        self.geometries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, geometry);
        handle
    }

    fn unregister_geometry(&self, handle: GeometryHandle) {
        let removed = self
            .geometries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
        if removed.is_none() {
            log::warn!("Unregistering unknown geometry {:?}", handle);
        }
    }
}
