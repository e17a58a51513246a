//! Stack configuration.

use morpheus_undi::UdpConfig;

use crate::gate::FarPtr;

/// Real-mode segment our resident thunks are loaded at by default.
pub const DEFAULT_THUNK_SEGMENT: u16 = 0x9C00;

/// Real-mode entry points installed into the IVT while the stack is hooked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorEntries {
    /// INT 1Ah handler (PXE installation check + API entry).
    pub int1a: FarPtr,
    /// INT 15h handler (hides our base memory from E820/88h callers).
    pub int15: FarPtr,
}

impl Default for VectorEntries {
    fn default() -> Self {
        Self {
            int1a: FarPtr::new(DEFAULT_THUNK_SEGMENT, 0x0000),
            int15: FarPtr::new(DEFAULT_THUNK_SEGMENT, 0x0040),
        }
    }
}

/// PXE stack configuration.
#[derive(Debug, Clone, Copy)]
pub struct StackConfig {
    pub vectors: VectorEntries,
    /// Receive buffers advertised by UNDI_GET_INFORMATION.
    pub rx_buffers: u16,
    /// Transmit buffers advertised by UNDI_GET_INFORMATION.
    pub tx_buffers: u16,
    /// Link speed reported when the adapter cannot tell (bits/s).
    pub link_speed: u32,
    /// Transmit completions remembered for UNDI_ISR.
    pub tx_completion_depth: u8,
    pub udp: UdpConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            vectors: VectorEntries::default(),
            rx_buffers: 32,
            tx_buffers: 32,
            link_speed: 100_000_000,
            tx_completion_depth: 32,
            udp: UdpConfig::default(),
        }
    }
}

impl StackConfig {
    /// Default configuration with a calibrated TSC.
    pub fn with_tsc(tsc_freq: u64) -> Self {
        let mut config = Self::default();
        config.udp.tsc_freq = tsc_freq;
        config
    }
}
