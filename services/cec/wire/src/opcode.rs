//! CEC opcode table.
//!
//! Control-plane messages name commands by string (`"ActiveSource"`), frames
//! carry the one-byte opcode. Both directions are generated from one table so
//! they cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! opcode_table {
    ($($(#[$doc:meta])* $variant:ident = $value:literal => $name:literal,)+) => {
        /// CEC opcodes understood by the emulator
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $($(#[$doc])* $variant = $value,)+
        }

        impl Opcode {
            /// Every opcode in table order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)+];

            /// Look up an opcode by its control-plane name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Opcode::$variant),)+
                    _ => None,
                }
            }

            /// Control-plane name of this opcode
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)+
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = crate::WireError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Opcode::$variant),)+
                    _ => Err(crate::WireError::Opcode(value)),
                }
            }
        }
    };
}

opcode_table! {
    /// Feature Abort
    FeatureAbort = 0x00 => "FeatureAbort",
    /// Image View On
    ImageViewOn = 0x04 => "ImageViewOn",
    /// Tuner Step Increment
    TunerStepIncrement = 0x05 => "TunerStepIncrement",
    /// Tuner Step Decrement
    TunerStepDecrement = 0x06 => "TunerStepDecrement",
    /// Tuner Device Status
    TunerDeviceStatus = 0x07 => "TunerDeviceStatus",
    /// Give Tuner Device Status
    GiveTunerDeviceStatus = 0x08 => "GiveTunerDeviceStatus",
    /// Record On
    RecordOn = 0x09 => "RecordOn",
    /// Record Status
    RecordStatus = 0x0A => "RecordStatus",
    /// Record Off
    RecordOff = 0x0B => "RecordOff",
    /// Text View On
    TextViewOn = 0x0D => "TextViewOn",
    /// Record TV Screen
    RecordTvScreen = 0x0F => "RecordTVScreen",
    /// Give Deck Status
    GiveDeckStatus = 0x1A => "GiveDeckStatus",
    /// Deck Status
    DeckStatus = 0x1B => "DeckStatus",
    /// Set Menu Language
    SetMenuLanguage = 0x32 => "SetMenuLanguage",
    /// Standby
    Standby = 0x36 => "StandBy",
    /// Play
    Play = 0x41 => "Play",
    /// Deck Control
    DeckControl = 0x42 => "DeckControl",
    /// User Control Pressed
    UserControlPressed = 0x44 => "UserControlPressed",
    /// User Control Released
    UserControlReleased = 0x45 => "UserControlReleased",
    /// Give OSD Name
    GiveOsdName = 0x46 => "GiveOSDName",
    /// Set OSD Name
    SetOsdName = 0x47 => "SetOSDName",
    /// Set OSD String
    SetOsdString = 0x64 => "SetOSDString",
    /// System Audio Mode Request
    SystemAudioModeRequest = 0x70 => "SystemAudioModeRequest",
    /// Give Audio Status
    GiveAudioStatus = 0x71 => "GiveAudioStatus",
    /// Set System Audio Mode
    SetSystemAudioMode = 0x72 => "SetSystemAudioMode",
    /// Report Audio Status
    ReportAudioStatus = 0x7A => "ReportAudioStatus",
    /// Give System Audio Mode Status
    GiveSystemAudioModeStatus = 0x7D => "GiveSystemAudioModeStatus",
    /// System Audio Mode Status
    SystemAudioModeStatus = 0x7E => "SystemAudioModeStatus",
    /// Routing Change
    RoutingChange = 0x80 => "RoutingChange",
    /// Routing Information
    RoutingInformation = 0x81 => "RoutingInformation",
    /// Active Source
    ActiveSource = 0x82 => "ActiveSource",
    /// Give Physical Address
    GivePhysicalAddress = 0x83 => "GivePhysicalAddress",
    /// Report Physical Address
    ReportPhysicalAddress = 0x84 => "ReportPhysicalAddress",
    /// Request Active Source
    RequestActiveSource = 0x85 => "RequestActiveSource",
    /// Set Stream Path
    SetStreamPath = 0x86 => "SetStreamPath",
    /// Device Vendor ID
    DeviceVendorId = 0x87 => "DeviceVendorID",
    /// Give Device Vendor ID
    GiveDeviceVendorId = 0x8C => "GiveDeviceVendorID",
    /// Give Device Power Status
    GiveDevicePowerStatus = 0x8F => "GiveDevicePowerStatus",
    /// Report Power Status
    ReportPowerStatus = 0x90 => "ReportPowerStatus",
    /// Get Menu Language
    GetMenuLanguage = 0x91 => "GetMenuLanguage",
    /// Select Analogue Service
    SelectAnalogueService = 0x92 => "SelectAnalogueService",
    /// Select Digital Service
    SelectDigitalService = 0x93 => "SelectDigitalService",
    /// Set Audio Rate
    SetAudioRate = 0x9A => "SetAudioRate",
    /// Inactive Source
    InactiveSource = 0x9D => "InactiveSource",
    /// CEC Version
    CecVersion = 0x9E => "CECVersion",
    /// Get CEC Version
    GetCecVersion = 0x9F => "GetCECVersion",
    /// Give Features
    GiveFeatures = 0xA5 => "GiveFeatures",
    /// Report Features
    ReportFeatures = 0xA6 => "ReportFeatures",
    /// Initiate ARC
    InitiateArc = 0xC0 => "InitiateARC",
    /// Report ARC Initiated
    ReportArcInitiated = 0xC1 => "ReportARCInitiated",
    /// Report ARC Terminated
    ReportArcTerminated = 0xC2 => "ReportARCTerminated",
    /// Request ARC Initiation
    RequestArcInitiation = 0xC3 => "RequestARCInitiation",
    /// Request ARC Termination
    RequestArcTermination = 0xC4 => "RequestARCTermination",
    /// Terminate ARC
    TerminateArc = 0xC5 => "TerminateARC",
}

impl Opcode {
    /// Raw opcode byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl FromStr for Opcode {
    type Err = crate::WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Numeric spellings ("0x82") are accepted alongside names
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let value = u8::from_str_radix(hex, 16).map_err(|_| crate::WireError::Opcode(0))?;
            return Opcode::try_from(value);
        }
        Opcode::from_name(s).ok_or(crate::WireError::Opcode(0))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_lookup() {
        assert_eq!(Opcode::from_name("ActiveSource"), Some(Opcode::ActiveSource));
        assert_eq!(Opcode::ActiveSource.as_u8(), 0x82);
        assert_eq!(Opcode::from_name("StandBy"), Some(Opcode::Standby));
        assert_eq!(Opcode::from_name("NotACommand"), None);
    }

    #[test]
    fn test_opcode_byte_conversion() {
        assert_eq!(Opcode::try_from(0x9D).unwrap(), Opcode::InactiveSource);
        assert!(Opcode::try_from(0xEE).is_err());
    }

    #[test]
    fn test_table_is_consistent() {
        for &opcode in Opcode::ALL {
            assert_eq!(Opcode::from_name(opcode.name()), Some(opcode));
            assert_eq!(Opcode::try_from(opcode.as_u8()).unwrap(), opcode);
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("0x36".parse::<Opcode>().unwrap(), Opcode::Standby);
        assert_eq!("SetOSDName".parse::<Opcode>().unwrap(), Opcode::SetOsdName);
        assert!("bogus".parse::<Opcode>().is_err());
    }
}
