use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
    FromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[repr(u8)]
pub enum Reg {
    #[default]
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}

impl Reg {
    /// Memory transfer scratch. `LDM`/`STM` always start at V0.
    pub const XFER: Reg = Reg::V0;
    /// Second transfer scratch, used for the low byte of addresses.
    pub const XFER_LO: Reg = Reg::V1;
    /// Stack frame base, high byte.
    pub const SP_HI: Reg = Reg::VD;
    /// Stack frame base, low byte.
    pub const SP_LO: Reg = Reg::VE;
    /// Carry / borrow / collision flag.
    pub const FLAG: Reg = Reg::VF;

    /// First and last register handed out by the allocator.
    pub const POOL_FIRST: Reg = Reg::V2;
    pub const POOL_LAST: Reg = Reg::VC;

    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_uppercase().parse::<Self>() {
            Ok(r) => Ok(r),
            Err(_) => Err(format!("Unknown reg name: {s}")),
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }
}
