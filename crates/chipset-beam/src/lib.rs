//! Raster beam position tracking.
//!
//! Tracks the virtual `(v, h)` position of the video beam as it is advanced
//! one DMA cycle at a time, and converts between beam position and absolute
//! DMA-cycle counts. PAL lines are a fixed 227 DMA cycles; NTSC alternates
//! 227/228-cycle lines under control of the long-line toggle, and both kinds
//! alternate 312/313 (PAL) or 262/263 (NTSC) line frames under control of the
//! long-frame toggle.

use emu_core::{Observable, Value};

/// Television line standard the beam is counting against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    Pal,
    Ntsc,
}

/// The six frame-duration kinds a beam can be in, used to precompute
/// cycles-per-frame without replaying a whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    PalLongFrame,
    PalShortFrame,
    NtscLongFrameLongLine,
    NtscLongFrameShortLine,
    NtscShortFrameLongLine,
    NtscShortFrameShortLine,
}

impl FrameKind {
    /// The frame kind that follows this one if the long-frame toggle fires
    /// (or does not) at end-of-frame.
    #[must_use]
    pub fn next(self, lof_toggle: bool) -> FrameKind {
        use FrameKind::{
            NtscLongFrameLongLine, NtscLongFrameShortLine, NtscShortFrameLongLine,
            NtscShortFrameShortLine, PalLongFrame, PalShortFrame,
        };
        match self {
            PalLongFrame => {
                if lof_toggle {
                    PalShortFrame
                } else {
                    PalLongFrame
                }
            }
            PalShortFrame => {
                if lof_toggle {
                    PalLongFrame
                } else {
                    PalShortFrame
                }
            }
            NtscLongFrameLongLine => {
                if lof_toggle {
                    NtscShortFrameShortLine
                } else {
                    NtscLongFrameShortLine
                }
            }
            NtscLongFrameShortLine => {
                if lof_toggle {
                    NtscShortFrameLongLine
                } else {
                    NtscLongFrameLongLine
                }
            }
            NtscShortFrameLongLine => {
                if lof_toggle {
                    NtscLongFrameLongLine
                } else {
                    NtscShortFrameLongLine
                }
            }
            NtscShortFrameShortLine => {
                if lof_toggle {
                    NtscLongFrameShortLine
                } else {
                    NtscShortFrameShortLine
                }
            }
        }
    }
}

pub const HPOS_CNT_PAL: i64 = 227;
pub const HPOS_CNT_NTSC_LL: i64 = 228;
pub const HPOS_CNT_NTSC_SL: i64 = 227;
pub const VPOS_CNT_PAL_LF: i64 = 313;
pub const VPOS_CNT_PAL_SF: i64 = 312;
pub const VPOS_CNT_NTSC_LF: i64 = 263;
pub const VPOS_CNT_NTSC_SF: i64 = 262;

/// Total DMA cycles in a single frame of the given kind.
#[must_use]
pub fn cycles_per_frame(kind: FrameKind) -> i64 {
    use FrameKind::{
        NtscLongFrameLongLine, NtscLongFrameShortLine, NtscShortFrameLongLine,
        NtscShortFrameShortLine, PalLongFrame, PalShortFrame,
    };
    match kind {
        PalLongFrame => VPOS_CNT_PAL_LF * HPOS_CNT_PAL,
        PalShortFrame => VPOS_CNT_PAL_SF * HPOS_CNT_PAL,
        NtscLongFrameLongLine => 132 * HPOS_CNT_NTSC_LL + 131 * HPOS_CNT_NTSC_SL,
        NtscLongFrameShortLine => 132 * HPOS_CNT_NTSC_SL + 131 * HPOS_CNT_NTSC_LL,
        NtscShortFrameLongLine | NtscShortFrameShortLine => {
            131 * HPOS_CNT_NTSC_SL + 131 * HPOS_CNT_NTSC_LL
        }
    }
}

/// The raster beam: vertical/horizontal position, frame count, and the
/// long-frame/long-line toggle flip-flops that determine line and frame
/// length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beam {
    pub v: i64,
    pub h: i64,
    pub frame: i64,

    pub lof: bool,
    pub lof_toggle: bool,

    pub lol: bool,
    pub lol_toggle: bool,

    pub kind: LineType,
}

impl Beam {
    #[must_use]
    pub fn new(kind: LineType) -> Self {
        let lol_toggle = matches!(kind, LineType::Ntsc);
        Beam {
            v: 0,
            h: 0,
            frame: 0,
            lof: false,
            lof_toggle: true,
            lol: false,
            lol_toggle,
            kind,
        }
    }

    /// Cycles in the current line, depending on `lol`.
    #[must_use]
    pub fn h_cnt(&self) -> i64 {
        match self.kind {
            LineType::Pal => HPOS_CNT_PAL,
            LineType::Ntsc => {
                if self.lol {
                    HPOS_CNT_NTSC_LL
                } else {
                    HPOS_CNT_NTSC_SL
                }
            }
        }
    }

    /// Lines in the current frame, depending on `lof`.
    #[must_use]
    pub fn v_cnt(&self) -> i64 {
        match self.kind {
            LineType::Pal => {
                if self.lof {
                    VPOS_CNT_PAL_LF
                } else {
                    VPOS_CNT_PAL_SF
                }
            }
            LineType::Ntsc => {
                if self.lof {
                    VPOS_CNT_NTSC_LF
                } else {
                    VPOS_CNT_NTSC_SF
                }
            }
        }
    }

    #[must_use]
    pub fn frame_kind(&self) -> FrameKind {
        match (self.kind, self.lof, self.even_line_long_line()) {
            (LineType::Pal, false, _) => FrameKind::PalShortFrame,
            (LineType::Pal, true, _) => FrameKind::PalLongFrame,
            (LineType::Ntsc, false, true) => FrameKind::NtscShortFrameLongLine,
            (LineType::Ntsc, false, false) => FrameKind::NtscShortFrameShortLine,
            (LineType::Ntsc, true, true) => FrameKind::NtscLongFrameLongLine,
            (LineType::Ntsc, true, false) => FrameKind::NtscLongFrameShortLine,
        }
    }

    fn even_line_long_line(&self) -> bool {
        self.v % 2 == 0 && self.lol
    }

    /// Cycles remaining for `count` consecutive frames starting at the
    /// current frame kind, predicting each subsequent kind from the
    /// long-frame toggle.
    #[must_use]
    pub fn cycles_per_frames(&self, count: i64) -> i64 {
        let mut kind = self.frame_kind();
        let mut total = 0;
        for _ in 0..count {
            total += cycles_per_frame(kind);
            kind = kind.next(self.lof_toggle);
        }
        total
    }

    /// Advances the beam by `n` DMA cycles (`n` must be non-negative).
    pub fn advance(&mut self, n: i64) {
        assert!(n >= 0, "Beam::advance requires a non-negative cycle delta");
        let mut remaining = n;

        // Jump close to the target frame in bulk, four frames at a time,
        // then step out the remainder line by line.
        let cycles_per_4 = self.cycles_per_frames(4);
        if cycles_per_4 > 0 {
            self.frame += (remaining / cycles_per_4) * 4;
            remaining %= cycles_per_4;
        }

        while remaining > 0 {
            let step = remaining.min(HPOS_CNT_PAL);
            remaining -= step;
            self.h += step;

            if self.h >= self.h_cnt() {
                self.h -= self.h_cnt();
                if self.lol_toggle {
                    self.lol = !self.lol;
                }

                self.v += 1;
                if self.v >= self.v_cnt() {
                    self.frame += 1;
                    if self.lof_toggle {
                        self.lof = !self.lof;
                    }
                    self.v = 0;
                }
            }
        }
    }

    /// Exact DMA-cycle count from the current position to `(v2, h2)`, which
    /// must not precede the current position within the frame.
    #[must_use]
    pub fn diff(&self, v2: i64, h2: i64) -> i64 {
        assert!(v2 > self.v || (v2 == self.v && h2 >= self.h));

        let mut probe = *self;
        let mut result = 0i64;
        while probe.v != v2 {
            probe.advance(HPOS_CNT_PAL);
            result += HPOS_CNT_PAL;
        }
        result += h2 - probe.h;

        assert!(result >= 0);
        result
    }
}

impl std::ops::Add<i64> for Beam {
    type Output = Beam;
    fn add(self, rhs: i64) -> Beam {
        let mut result = self;
        result.advance(rhs);
        result
    }
}

impl Observable for Beam {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "v" => Some(Value::U32(u32::try_from(self.v).ok()?)),
            "h" => Some(Value::U32(u32::try_from(self.h).ok()?)),
            "frame" => Some(Value::U64(u64::try_from(self.frame).ok()?)),
            "lof" => Some(Value::Bool(self.lof)),
            "lol" => Some(Value::Bool(self.lol)),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["v", "h", "frame", "lof", "lol"]
    }
}

#[cfg(test)]
mod tests {
    use super::{Beam, LineType, cycles_per_frame};

    #[test]
    fn pal_line_and_frame_lengths() {
        let beam = Beam::new(LineType::Pal);
        assert_eq!(beam.h_cnt(), 227);
        assert_eq!(beam.v_cnt(), 312);
    }

    #[test]
    fn ntsc_long_line_alternates_with_toggle() {
        let mut beam = Beam::new(LineType::Ntsc);
        assert!(beam.lol_toggle);
        assert_eq!(beam.h_cnt(), 227);
        beam.advance(227);
        assert_eq!(beam.h, 0);
        assert!(beam.lol);
        assert_eq!(beam.h_cnt(), 228);
    }

    #[test]
    fn advance_wraps_line_and_frame() {
        let mut beam = Beam::new(LineType::Pal);
        beam.advance(227 * 312);
        assert_eq!(beam.v, 0);
        assert_eq!(beam.h, 0);
        assert_eq!(beam.frame, 1);
    }

    #[test]
    fn diff_matches_advance_for_arbitrary_deltas() {
        let beam = Beam::new(LineType::Pal);
        for n in [0i64, 1, 50, 226, 227, 500, 227 * 312 + 10] {
            let advanced = beam + n;
            assert_eq!(beam.diff(advanced.v, advanced.h), n);
        }
    }

    #[test]
    fn cycles_per_frame_matches_line_sum() {
        assert_eq!(cycles_per_frame(super::FrameKind::PalLongFrame), 313 * 227);
        assert_eq!(cycles_per_frame(super::FrameKind::PalShortFrame), 312 * 227);
    }
}
