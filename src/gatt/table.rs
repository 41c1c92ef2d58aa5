//! Attribute table declaration and registration
//!
//! The service layout is fixed at compile time. Registration hands each
//! declaration to the host stack once, records the handles it assigns and
//! produces an immutable [`AttributeTable`] used for all later lookups.
//!
//! | Service | Characteristic | Permissions |
//! |---------|----------------|-------------|
//! | CSC (0x1816) | Feature (0x2A5C) | read |
//! | CSC (0x1816) | Sensor Location (0x2A5D) | read |
//! | CSC (0x1816) | SC Control Point (0x2A55) | write, indicate |
//! | IMU (vendor) | Live Data | notify (optionally read) |
//! | Device Info (0x180A) | Manufacturer Name (0x2A29) | read |
//! | Device Info (0x180A) | Model Number (0x2A24) | read |

use crate::config::gatt::MAX_CHARACTERISTICS;
use crate::gatt::error::RegistrationError;
use crate::gatt::uuid::{self, Uuid};
use heapless::Vec;

/// Characteristic property flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(u8);

impl Permissions {
    pub const READ: Self = Self(0x02);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the characteristic carries a CCCD
    pub const fn is_subscribable(self) -> bool {
        self.0 & (Self::NOTIFY.0 | Self::INDICATE.0) != 0
    }

    /// Raw GATT characteristic properties byte
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Every characteristic this server knows how to serve
///
/// Access dispatch matches on this enum exhaustively, so there is no
/// fallback path for an unknown characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Characteristic {
    CscFeature,
    SensorLocation,
    ControlPoint,
    LiveData,
    ManufacturerName,
    ModelNumber,
}

/// Static characteristic declaration
#[derive(Debug)]
pub struct CharacteristicDef {
    pub kind: Characteristic,
    pub uuid: Uuid,
    pub permissions: Permissions,
}

/// Static service declaration
#[derive(Debug)]
pub struct ServiceDef {
    pub uuid: Uuid,
    pub characteristics: &'static [CharacteristicDef],
}

pub static CSC_SERVICE: ServiceDef = ServiceDef {
    uuid: uuid::CSC_SERVICE,
    characteristics: &[
        CharacteristicDef {
            kind: Characteristic::CscFeature,
            uuid: uuid::CSC_FEATURE,
            permissions: Permissions::READ,
        },
        CharacteristicDef {
            kind: Characteristic::SensorLocation,
            uuid: uuid::SENSOR_LOCATION,
            permissions: Permissions::READ,
        },
        CharacteristicDef {
            kind: Characteristic::ControlPoint,
            uuid: uuid::SC_CONTROL_POINT,
            permissions: Permissions::WRITE.union(Permissions::INDICATE),
        },
    ],
};

pub static IMU_SERVICE: ServiceDef = ServiceDef {
    uuid: uuid::IMU_SERVICE,
    characteristics: &[CharacteristicDef {
        kind: Characteristic::LiveData,
        uuid: uuid::IMU_LIVE_DATA,
        permissions: Permissions::NOTIFY,
    }],
};

/// IMU service variant whose live data can also be read on demand
pub static IMU_SERVICE_READABLE: ServiceDef = ServiceDef {
    uuid: uuid::IMU_SERVICE,
    characteristics: &[CharacteristicDef {
        kind: Characteristic::LiveData,
        uuid: uuid::IMU_LIVE_DATA,
        permissions: Permissions::NOTIFY.union(Permissions::READ),
    }],
};

pub static DEVICE_INFO_SERVICE: ServiceDef = ServiceDef {
    uuid: uuid::DEVICE_INFO_SERVICE,
    characteristics: &[
        CharacteristicDef {
            kind: Characteristic::ManufacturerName,
            uuid: uuid::MANUFACTURER_NAME,
            permissions: Permissions::READ,
        },
        CharacteristicDef {
            kind: Characteristic::ModelNumber,
            uuid: uuid::MODEL_NUMBER,
            permissions: Permissions::READ,
        },
    ],
};

/// The service list in registration order
pub fn services(live_data_readable: bool) -> [&'static ServiceDef; 3] {
    let imu = if live_data_readable {
        &IMU_SERVICE_READABLE
    } else {
        &IMU_SERVICE
    };
    [&CSC_SERVICE, imu, &DEVICE_INFO_SERVICE]
}

/// Opaque attribute handle assigned by the host stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttributeHandle(pub u16);

/// Handles assigned to one characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicHandles {
    pub value: AttributeHandle,
    /// Present for notify/indicate characteristics
    pub cccd: Option<AttributeHandle>,
}

/// Host-side attribute database the table is registered into
pub trait AttributeRegistry {
    /// Reserve space for `attributes` entries before anything is added
    fn reserve(&mut self, attributes: usize) -> Result<(), RegistrationError>;

    /// Add a primary service, returning its declaration handle
    fn add_service(&mut self, uuid: Uuid) -> Result<AttributeHandle, RegistrationError>;

    /// Add a characteristic to the most recently added service
    fn add_characteristic(
        &mut self,
        uuid: Uuid,
        permissions: Permissions,
    ) -> Result<CharacteristicHandles, RegistrationError>;
}

/// A registered characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub kind: Characteristic,
    pub permissions: Permissions,
    pub handles: CharacteristicHandles,
}

/// Immutable table of registered characteristics
#[derive(Debug)]
pub struct AttributeTable {
    entries: Vec<Entry, MAX_CHARACTERISTICS>,
}

impl AttributeTable {
    /// Number of ATT attributes the services occupy
    ///
    /// One declaration per service, declaration + value per characteristic
    /// and one CCCD per notify/indicate characteristic.
    pub fn attribute_count(services: &[&ServiceDef]) -> usize {
        services
            .iter()
            .map(|service| {
                1 + service
                    .characteristics
                    .iter()
                    .map(|c| if c.permissions.is_subscribable() { 3 } else { 2 })
                    .sum::<usize>()
            })
            .sum()
    }

    /// Register every service with the host and collect the assigned handles
    pub fn register<R: AttributeRegistry>(
        registry: &mut R,
        services: &[&ServiceDef],
    ) -> Result<Self, RegistrationError> {
        for service in services {
            validate_unique(service)?;
        }

        let characteristic_count: usize = services.iter().map(|s| s.characteristics.len()).sum();
        if characteristic_count > MAX_CHARACTERISTICS {
            return Err(RegistrationError::AttributeSpaceExhausted {
                required: characteristic_count,
                available: MAX_CHARACTERISTICS,
            });
        }

        registry.reserve(Self::attribute_count(services))?;

        let mut entries: Vec<Entry, MAX_CHARACTERISTICS> = Vec::new();
        let mut assigned: Vec<AttributeHandle, { MAX_CHARACTERISTICS * 3 }> = Vec::new();

        for service in services {
            let service_handle = registry.add_service(service.uuid)?;
            claim(&mut assigned, service_handle)?;

            for def in service.characteristics {
                let handles = registry.add_characteristic(def.uuid, def.permissions)?;
                claim(&mut assigned, handles.value)?;
                if let Some(cccd) = handles.cccd {
                    claim(&mut assigned, cccd)?;
                }

                log::debug!(
                    "GATT: {:?} registered at handle {} (cccd {:?})",
                    def.kind,
                    handles.value.0,
                    handles.cccd.map(|h| h.0)
                );

                entries
                    .push(Entry {
                        kind: def.kind,
                        permissions: def.permissions,
                        handles,
                    })
                    .map_err(|_| RegistrationError::AttributeSpaceExhausted {
                        required: characteristic_count,
                        available: MAX_CHARACTERISTICS,
                    })?;
            }
        }

        Ok(Self { entries })
    }

    /// Find the characteristic whose value handle matches
    pub fn lookup(&self, handle: AttributeHandle) -> Option<&Entry> {
        self.entries.iter().find(|e| e.handles.value == handle)
    }

    /// Find the characteristic owning a value or CCCD handle
    pub fn lookup_subscription(&self, handle: AttributeHandle) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.handles.value == handle || e.handles.cccd == Some(handle))
    }

    pub fn entry(&self, kind: Characteristic) -> Option<&Entry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn value_handle(&self, kind: Characteristic) -> Option<AttributeHandle> {
        self.entry(kind).map(|e| e.handles.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}

fn validate_unique(service: &ServiceDef) -> Result<(), RegistrationError> {
    for (i, def) in service.characteristics.iter().enumerate() {
        if service.characteristics[i + 1..]
            .iter()
            .any(|other| other.uuid == def.uuid)
        {
            return Err(RegistrationError::DuplicateCharacteristic(def.uuid));
        }
    }
    Ok(())
}

fn claim<const N: usize>(
    assigned: &mut Vec<AttributeHandle, N>,
    handle: AttributeHandle,
) -> Result<(), RegistrationError> {
    if assigned.contains(&handle) {
        return Err(RegistrationError::HandleReused(handle));
    }
    assigned
        .push(handle)
        .map_err(|_| RegistrationError::HandleReused(handle))
}
