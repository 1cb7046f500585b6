//! Amiga floppy drive mechanism emulator.
//!
//! Emulates the physical drive: head positioning, motor control, disk
//! change detection, and MFM track encoding. Control signals come from
//! CIA-B port B; status signals feed back to CIA-A port A.

pub mod mfm;

use std::fmt;

use format_adf::{Adf, SECTORS_PER_TRACK_HD};
use mfm::encode_mfm_track;

/// E-clock ticks for motor spin-up (~500ms at 709 kHz).
const MOTOR_SPINUP_TICKS: u32 = 350_000;

/// Last 4 recorded cylinder steps (one byte each) used by `polls_for_disk`.
const POLL_HISTORY_MASK: u64 = 0xFFFF_FFFF;

/// Head-stepping patterns Kickstart uses to probe for a disk with the
/// drive motor off: 1.2/1.3 step 0-1-0-1..., 2.0 steps 0-1-2-3-2-3...
const POLL_SIGNATURES: [u64; 4] = [
    0x0100_0100_0100,
    0x0001_0001_0001,
    0x0203_0203_0203,
    0x0302_0302_0302,
];

/// The density a disk image was formatted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    Dd,
    Hd,
}

impl Density {
    fn of(adf: &Adf) -> Self {
        if adf.sectors_per_track() == SECTORS_PER_TRACK_HD {
            Self::Hd
        } else {
            Self::Dd
        }
    }
}

/// The drive's own form factor, which gates which disk densities it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKind {
    /// 3.5" drive that only accepts double-density media.
    Dd35,
    /// 3.5" drive that accepts both double- and high-density media.
    Hd35,
}

impl DriveKind {
    fn accepts(self, density: Density) -> bool {
        match self {
            Self::Dd35 => density == Density::Dd,
            Self::Hd35 => true,
        }
    }
}

#[derive(Debug)]
pub enum DriveError {
    /// A disk whose density doesn't match the drive's form factor was inserted.
    Incompatible,
}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incompatible => write!(f, "disk is incompatible with this drive"),
        }
    }
}

impl std::error::Error for DriveError {}

/// Drive status bits for CIA-A PRA (active-low: 0 = asserted).
pub struct DriveStatus {
    /// PA2: /DSKCHANGE — low when disk has been removed since last step.
    pub disk_change: bool,
    /// PA3: /DSKPROT — low when disk is write-protected.
    pub write_protect: bool,
    /// PA4: /DSKTRACK0 — low when head is at cylinder 0.
    pub track0: bool,
    /// PA5: /DSKRDY — low when motor is at speed.
    pub ready: bool,
}

pub struct AmigaFloppyDrive {
    kind: DriveKind,
    disk: Option<Adf>,
    cylinder: u32,
    head: u32,
    motor_on: bool,
    motor_spinning: bool,
    spin_timer: u32,
    selected: bool,
    disk_changed: bool,
    prev_step: bool,
    write_protect: bool,
    /// Last 8 recorded cylinder positions, one byte each, most recent in
    /// the low byte. Used to detect Kickstart's disk-polling head dance.
    cylinder_history: u64,
}

impl AmigaFloppyDrive {
    pub fn new() -> Self {
        Self::with_kind(DriveKind::Dd35)
    }

    pub fn with_kind(kind: DriveKind) -> Self {
        Self {
            kind,
            disk: None,
            cylinder: 0,
            head: 0,
            motor_on: false,
            motor_spinning: false,
            spin_timer: 0,
            selected: false,
            disk_changed: true, // No disk at power-on
            prev_step: true,    // Active-low: idle = high
            write_protect: false,
            cylinder_history: 0,
        }
    }

    /// Inserts a disk image, rejecting it with [`DriveError::Incompatible`]
    /// if its density doesn't match this drive's form factor.
    pub fn insert_disk(&mut self, adf: Adf) -> Result<(), DriveError> {
        if !self.kind.accepts(Density::of(&adf)) {
            return Err(DriveError::Incompatible);
        }
        self.disk = Some(adf);
        self.disk_changed = false;
        self.write_protect = false;
        Ok(())
    }

    pub fn eject_disk(&mut self) {
        self.disk = None;
        self.disk_changed = true;
        self.write_protect = false;
    }

    /// Sets or clears the write-protect sensor for the inserted disk.
    pub fn set_write_protected(&mut self, value: bool) {
        self.write_protect = value;
    }

    /// True when the head-step history matches a known Kickstart
    /// disk-polling signature and no disk is currently inserted.
    #[must_use]
    pub fn polls_for_disk(&self) -> bool {
        if self.has_disk() {
            return false;
        }
        POLL_SIGNATURES
            .iter()
            .any(|sig| self.cylinder_history & POLL_HISTORY_MASK == sig & POLL_HISTORY_MASK)
    }

    /// Update control signals from CIA-B PRB.
    /// All active-low: the boolean parameters are true when the signal
    /// is asserted (pin driven low).
    pub fn update_control(
        &mut self,
        step: bool,
        dir_inward: bool,
        side_upper: bool,
        sel: bool,
        motor: bool,
    ) {
        // Drive select latches motor state (active-low select)
        if sel {
            self.selected = true;
            self.motor_on = motor;
            if motor && !self.motor_spinning {
                self.spin_timer = 0;
            }
            if !motor {
                self.motor_spinning = false;
                self.spin_timer = 0;
            }
        } else {
            self.selected = false;
        }

        // Head side: 0 = upper (head 1), 1 = lower (head 0)
        // The parameter is already decoded: side_upper = true means DSKSIDE* asserted (low)
        self.head = if side_upper { 1 } else { 0 };

        // Step on falling edge (prev was high/deasserted, now low/asserted)
        let step_edge = step && !self.prev_step;
        self.prev_step = step;

        if step_edge {
            if dir_inward {
                if self.cylinder < 79 {
                    self.cylinder += 1;
                    self.record_cylinder();
                }
            } else if self.cylinder > 0 {
                self.cylinder -= 1;
                self.record_cylinder();
            }
            // Any step pulse clears DSKCHANGE when a disk is present
            if self.disk.is_some() {
                self.disk_changed = false;
            }
        }
    }

    fn record_cylinder(&mut self) {
        self.cylinder_history = (self.cylinder_history << 8) | u64::from(self.cylinder);
    }

    /// Advance motor spin-up timer. Call at E-clock rate.
    pub fn tick(&mut self) {
        if self.motor_on && !self.motor_spinning {
            self.spin_timer += 1;
            if self.spin_timer >= MOTOR_SPINUP_TICKS {
                self.motor_spinning = true;
            }
        }
    }

    /// Current drive status for CIA-A PRA input.
    /// All values are active-low booleans (true = signal asserted = pin low).
    pub fn status(&self) -> DriveStatus {
        DriveStatus {
            disk_change: self.disk_changed,
            write_protect: self.write_protect,
            track0: self.cylinder == 0,
            ready: self.motor_spinning,
        }
    }

    /// Encode the current track as raw MFM data. Returns `None` if no disk.
    pub fn encode_mfm_track(&self) -> Option<Vec<u8>> {
        let adf = self.disk.as_ref()?;
        let track_num = (self.cylinder * 2 + self.head) as u8;
        let sectors = adf.read_track_sectors(self.cylinder, self.head);
        Some(encode_mfm_track(
            sectors,
            track_num,
            adf.sectors_per_track(),
        ))
    }

    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    pub fn cylinder(&self) -> u32 {
        self.cylinder
    }

    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn motor_on(&self) -> bool {
        self.motor_on
    }
}

impl Default for AmigaFloppyDrive {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_toward_center() {
        let mut drive = AmigaFloppyDrive::new();
        assert_eq!(drive.cylinder(), 0);

        // Select drive, motor on, direction inward
        drive.update_control(false, true, false, true, true);
        // Step pulse: deasserted -> asserted (falling edge)
        drive.update_control(true, true, false, true, true);
        assert_eq!(drive.cylinder(), 1);
    }

    #[test]
    fn step_toward_edge() {
        let mut drive = AmigaFloppyDrive::new();
        // First move inward
        drive.update_control(false, true, false, true, true);
        drive.update_control(true, true, false, true, true);
        drive.update_control(false, true, false, true, true);
        drive.update_control(true, true, false, true, true);
        assert_eq!(drive.cylinder(), 2);

        // Now step toward edge (dir_inward = false)
        drive.update_control(false, false, false, true, true);
        drive.update_control(true, false, false, true, true);
        assert_eq!(drive.cylinder(), 1);
    }

    #[test]
    fn no_step_below_zero() {
        let mut drive = AmigaFloppyDrive::new();
        drive.update_control(false, false, false, true, true);
        drive.update_control(true, false, false, true, true);
        assert_eq!(drive.cylinder(), 0);
    }

    #[test]
    fn no_step_above_79() {
        let mut drive = AmigaFloppyDrive::new();
        // Move to track 79
        for _ in 0..80 {
            drive.update_control(false, true, false, true, true);
            drive.update_control(true, true, false, true, true);
        }
        assert_eq!(drive.cylinder(), 79);
    }

    #[test]
    fn track0_status() {
        let drive = AmigaFloppyDrive::new();
        assert!(drive.status().track0);
    }

    #[test]
    fn motor_spinup() {
        let mut drive = AmigaFloppyDrive::new();
        drive.update_control(false, false, false, true, true);
        assert!(!drive.status().ready);

        for _ in 0..MOTOR_SPINUP_TICKS {
            drive.tick();
        }
        assert!(drive.status().ready);
    }

    #[test]
    fn disk_change_cleared_by_step() {
        let mut drive = AmigaFloppyDrive::new();
        let adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_DD]).expect("valid");
        drive.insert_disk(adf).expect("compatible");
        assert!(!drive.status().disk_change);

        drive.eject_disk();
        assert!(drive.status().disk_change);

        // Insert new disk — change still set until step
        let adf2 = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_DD]).expect("valid");
        drive.insert_disk(adf2).expect("compatible");

        // Step clears change flag
        drive.update_control(false, true, false, true, true);
        drive.update_control(true, true, false, true, true);
        assert!(!drive.status().disk_change);
    }

    #[test]
    fn encode_track_returns_data_with_disk() {
        let mut drive = AmigaFloppyDrive::new();
        let adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_DD]).expect("valid");
        drive.insert_disk(adf).expect("compatible");

        let mfm = drive.encode_mfm_track();
        assert!(mfm.is_some());
        assert_eq!(mfm.expect("some").len(), mfm::MFM_TRACK_BYTES);
    }

    #[test]
    fn encode_track_returns_none_without_disk() {
        let drive = AmigaFloppyDrive::new();
        assert!(drive.encode_mfm_track().is_none());
    }

    #[test]
    fn head_select() {
        let mut drive = AmigaFloppyDrive::new();
        // side_upper = true means upper head (head 1)
        drive.update_control(false, false, true, true, true);
        assert_eq!(drive.head(), 1);
        // side_upper = false means lower head (head 0)
        drive.update_control(false, false, false, true, true);
        assert_eq!(drive.head(), 0);
    }

    #[test]
    fn dd_drive_rejects_hd_disk_as_incompatible() {
        let mut drive = AmigaFloppyDrive::with_kind(DriveKind::Dd35);
        let hd_adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_HD]).expect("valid");
        assert!(matches!(
            drive.insert_disk(hd_adf),
            Err(DriveError::Incompatible)
        ));
        assert!(!drive.has_disk());
    }

    #[test]
    fn hd_drive_accepts_both_densities() {
        let mut drive = AmigaFloppyDrive::with_kind(DriveKind::Hd35);
        let dd_adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_DD]).expect("valid");
        assert!(drive.insert_disk(dd_adf).is_ok());
        drive.eject_disk();

        let hd_adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_HD]).expect("valid");
        assert!(drive.insert_disk(hd_adf).is_ok());
    }

    #[test]
    fn write_protect_flag_is_reported_and_clears_on_disk_change() {
        let mut drive = AmigaFloppyDrive::new();
        let adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_DD]).expect("valid");
        drive.insert_disk(adf).expect("compatible");
        assert!(!drive.status().write_protect);

        drive.set_write_protected(true);
        assert!(drive.status().write_protect);

        drive.eject_disk();
        assert!(!drive.status().write_protect);
    }

    #[test]
    fn polls_for_disk_detects_12_13_signature_with_no_disk() {
        let mut drive = AmigaFloppyDrive::new();
        // 0-1-0-1-... with motor off: step inward/outward 16 times.
        for i in 0..16 {
            let dir_inward = i % 2 == 0;
            drive.update_control(false, dir_inward, false, true, false);
            drive.update_control(true, dir_inward, false, true, false);
        }
        assert!(drive.polls_for_disk());
    }

    #[test]
    fn polls_for_disk_detects_20_signature_with_no_disk() {
        let mut drive = AmigaFloppyDrive::new();
        // Climb to cylinder 2, then settle into the 2.0-style 3-2-3-2 dance.
        for _ in 0..2 {
            drive.update_control(false, true, false, true, false);
            drive.update_control(true, true, false, true, false);
        }
        for i in 0..6 {
            let dir_inward = i % 2 == 0;
            drive.update_control(false, dir_inward, false, true, false);
            drive.update_control(true, dir_inward, false, true, false);
        }
        assert!(drive.polls_for_disk());
    }

    #[test]
    fn polls_for_disk_is_false_once_a_disk_is_inserted() {
        let mut drive = AmigaFloppyDrive::new();
        for i in 0..16 {
            let dir_inward = i % 2 == 0;
            drive.update_control(false, dir_inward, false, true, false);
            drive.update_control(true, dir_inward, false, true, false);
        }
        assert!(drive.polls_for_disk());

        let adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_DD]).expect("valid");
        drive.insert_disk(adf).expect("compatible");
        assert!(!drive.polls_for_disk());
    }

    #[test]
    fn polls_for_disk_is_false_for_ordinary_monotonic_stepping() {
        let mut drive = AmigaFloppyDrive::new();
        for _ in 0..16 {
            drive.update_control(false, true, false, true, false);
            drive.update_control(true, true, false, true, false);
        }
        assert!(!drive.polls_for_disk());
    }
}
