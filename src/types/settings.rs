//! Command settings shared between the caller and the dispatch loop

use std::sync::atomic::{AtomicI32, AtomicU8, AtomicU32, Ordering};

/// Default speed increment carried by move commands.
pub const DEFAULT_MOVE_SPEED_INCREMENT: u8 = 4;

/// Default motor deadzone.
pub const DEFAULT_DEADZONE: u32 = 30;

/// Values read by the command channel when it encodes a frame.
///
/// Every field is an independent atomic: writers never block, the dispatch loop
/// reads whatever was stored last.
#[derive(Debug)]
pub struct Settings {
    move_speed_increment: AtomicU8,
    camera_flash_duty: AtomicU8,
    speed_l: AtomicI32,
    speed_r: AtomicI32,
    deadzone: AtomicU32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            move_speed_increment: AtomicU8::new(DEFAULT_MOVE_SPEED_INCREMENT),
            camera_flash_duty: AtomicU8::new(0),
            speed_l: AtomicI32::new(0),
            speed_r: AtomicI32::new(0),
            deadzone: AtomicU32::new(DEFAULT_DEADZONE),
        }
    }
}

impl Settings {
    pub fn move_speed_increment(&self) -> u8 {
        self.move_speed_increment.load(Ordering::Relaxed)
    }

    pub fn set_move_speed_increment(&self, value: u8) {
        self.move_speed_increment.store(value, Ordering::Relaxed);
    }

    pub fn camera_flash_duty(&self) -> u8 {
        self.camera_flash_duty.load(Ordering::Relaxed)
    }

    pub fn set_camera_flash_duty(&self, value: u8) {
        self.camera_flash_duty.store(value, Ordering::Relaxed);
    }

    /// Left and right wheel speeds used by `Set`.
    pub fn speeds(&self) -> (i32, i32) {
        (self.speed_l.load(Ordering::Relaxed), self.speed_r.load(Ordering::Relaxed))
    }

    pub fn set_speeds(&self, speed_l: i32, speed_r: i32) {
        self.speed_l.store(speed_l, Ordering::Relaxed);
        self.speed_r.store(speed_r, Ordering::Relaxed);
    }

    pub fn deadzone(&self) -> u32 {
        self.deadzone.load(Ordering::Relaxed)
    }

    pub fn set_deadzone(&self, value: u32) {
        self.deadzone.store(value, Ordering::Relaxed);
    }
}
