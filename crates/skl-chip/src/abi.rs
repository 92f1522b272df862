//! Wire record sizes and fixed values of module configuration payloads.
//!
//! All records are little-endian and packed. Sizes are in bytes.
//!
//! ```text
//! Record              Size  Layout
//! ─────────────────── ───── ─────────────────────────────────────────────
//! audio format          24  s_freq bit_depth ch_map ch_cfg interleave (u32)
//!                           channels valid_bits sample_type rsvd (u8)
//! base cfg              40  cps ibs obs is_pages (u32) + audio format
//! copier cfg       80 + caps base + out fmt + feature mask + node id
//!                           + dma buffer size + config length + caps
//! probe cfg             48  base + node id + dma buffer size
//! src / asrc cfg        48  base + target rate + mode
//! up/down mixer cfg     76  base + out ch cfg + coeff sel + 6 coeff + ch map
//! base + out fmt        64  base + out fmt
//! gain record           20  channel id + volume + ramp type + ramp (u64)
//! copier pin format     52  sink id + src fmt + dst fmt
//! dma control        8 + n  node id + config length + blob
//! ```

/// Packed audio data format.
pub const AUDIO_FMT_SIZE: usize = 24;
/// Base module configuration.
pub const BASE_CFG_SIZE: usize = 16 + AUDIO_FMT_SIZE;
/// Copier configuration without the trailing gateway blob.
pub const CPR_CFG_SIZE: usize = BASE_CFG_SIZE + AUDIO_FMT_SIZE + 4 + 12;
/// Probe module configuration.
pub const PROBE_CFG_SIZE: usize = BASE_CFG_SIZE + 8;
/// SRC and ASRC configuration.
pub const SRC_CFG_SIZE: usize = BASE_CFG_SIZE + 8;
/// Up/down mixer configuration.
pub const UPDWMIX_CFG_SIZE: usize = BASE_CFG_SIZE + 4 + 4 + 4 * UP_DOWN_MIXER_MAX_COEFF + 4;
/// Base configuration followed by an output format.
pub const BASE_OUTFMT_CFG_SIZE: usize = BASE_CFG_SIZE + AUDIO_FMT_SIZE;
/// One per-channel gain control record.
pub const GAIN_RECORD_SIZE: usize = 20;
/// Copier extra output pin format (large config `CPR_SINK_FMT`).
pub const CPR_PIN_FMT_SIZE: usize = 4 + 2 * AUDIO_FMT_SIZE;
/// DMA control header preceding the gateway blob.
pub const DMA_CONTROL_HDR_SIZE: usize = 8;

/// Number of user coefficients in the up/down mixer record.
pub const UP_DOWN_MIXER_MAX_COEFF: usize = 6;

/// Gain record channel selector addressing every channel.
pub const ALL_CHANNELS: u32 = 0xFFFF_FFFF;

/// Length in dwords the firmware expects for an I2S DMA control blob,
/// whatever the size of the NHLT blob carrying it.
pub const DMA_I2S_BLOB_DWORDS: u32 = 21;

/// Audio interleaving styles.
pub mod interleaving {
    /// Samples of all channels interleaved per frame.
    pub const PER_CHANNEL: u32 = 0;
    /// Each channel in its own block.
    pub const PER_SAMPLE: u32 = 1;
}

/// Sample types.
pub mod sample_type {
    /// Signed integer, most significant bits first.
    pub const INT_MSB: u8 = 0;
    pub const INT_LSB: u8 = 1;
    pub const INT_SIGNED: u8 = 2;
    pub const INT_UNSIGNED: u8 = 3;
    pub const FLOAT: u8 = 4;
}

/// ASRC conversion direction.
pub mod asrc_mode {
    /// Synchronous SRC, no direction.
    pub const NONE: u32 = 0;
    /// Playback: host side drives the clock.
    pub const DOWNLINK: u32 = 1;
    /// Capture: link side drives the clock.
    pub const UPLINK: u32 = 2;
}

/// Firmware logging parameters.
pub mod logs {
    /// Log aging timer period in milliseconds.
    pub const AGING_TIMER_PERIOD: u32 = 100;
    /// FIFO full timer period in milliseconds.
    pub const FIFO_FULL_TIMER_PERIOD: u32 = 100;
}

/// Underrun/overrun notification mask enabling every notification class.
pub const NOTIFICATION_MASK_ALL: u32 = 0xF;
