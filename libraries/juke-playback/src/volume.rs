//! Master volume with mute
//!
//! Levels are 0-255 as handed to backends. Backends that scale samples
//! themselves can use [`Volume::gain`], which maps the level onto -60 dB to
//! 0 dB to match human hearing.

/// Master volume controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    /// Volume level (0-255)
    level: u8,

    /// Mute state (preserves volume level)
    muted: bool,
}

impl Volume {
    pub const MAX: u8 = u8::MAX;

    pub fn new(level: u8) -> Self {
        Self {
            level,
            muted: false,
        }
    }

    /// Set volume level; returns `true` if it changed
    pub fn set_level(&mut self, level: u8) -> bool {
        let changed = self.level != level;
        self.level = level;
        changed
    }

    /// Remembered level, also while muted
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Level to hand to the backend (0 while muted)
    pub fn effective(&self) -> u8 {
        if self.muted {
            0
        } else {
            self.level
        }
    }

    /// Toggle mute state; returns the new state
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Linear gain multiplier for the effective level
    ///
    /// Formula: gain = 10^((level / 255 - 1) * 60 / 20)
    /// - 0   → silence
    /// - 128 → about -30 dB
    /// - 255 → 0 dB (unity)
    pub fn gain(&self) -> f32 {
        Self::level_to_gain(self.effective())
    }

    pub fn level_to_gain(level: u8) -> f32 {
        if level == 0 {
            return 0.0;
        }
        let db = (f32::from(level) / f32::from(Self::MAX) - 1.0) * 60.0;
        10.0_f32.powf(db / 20.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(Self::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_preserves_level() {
        let mut vol = Volume::new(200);
        assert!(vol.toggle_mute());
        assert_eq!(vol.effective(), 0);
        assert_eq!(vol.level(), 200);

        assert!(!vol.toggle_mute());
        assert_eq!(vol.effective(), 200);
    }

    #[test]
    fn set_level_reports_change() {
        let mut vol = Volume::default();
        assert!(!vol.set_level(255));
        assert!(vol.set_level(10));
        assert_eq!(vol.level(), 10);
    }

    #[test]
    fn gain_calculation() {
        assert_eq!(Volume::new(0).gain(), 0.0);
        assert!((Volume::new(255).gain() - 1.0).abs() < 0.001);

        // Halfway is roughly -30 dB
        let half = Volume::level_to_gain(128);
        assert!((half - 0.0316).abs() < 0.002);

        let mut muted = Volume::new(255);
        muted.toggle_mute();
        assert_eq!(muted.gain(), 0.0);
    }
}
