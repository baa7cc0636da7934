//! Sector-level floppy disk images.
//!
//! A [`Disk`] is a flat byte array addressed by `(track, side, sector)`.
//! The layout is track-major, matching the common JV1 image format used
//! by TRS-80 emulators: every track holds the same number of fixed-size
//! sectors, stored in ascending sector order, sides interleaved within
//! each track.

use std::fmt;

/// Raised when an image's byte length does not match its declared
/// geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryError {
    pub tracks: u8,
    pub sides: u8,
    pub sectors_per_track: u8,
    pub sector_size: usize,
    pub expected_len: usize,
    pub actual_len: usize,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "disk image is {} bytes but {} tracks x {} sides x {} sectors x {} bytes needs {}",
            self.actual_len,
            self.tracks,
            self.sides,
            self.sectors_per_track,
            self.sector_size,
            self.expected_len
        )
    }
}

impl std::error::Error for GeometryError {}

/// An in-memory floppy disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    tracks: u8,
    sides: u8,
    sectors_per_track: u8,
    sector_size: usize,
    write_protected: bool,
    data: Vec<u8>,
}

impl Disk {
    /// Wraps an existing image, validating that its length matches the
    /// declared geometry.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] when `data.len()` disagrees with the
    /// product of the geometry parameters.
    pub fn new(
        tracks: u8,
        sides: u8,
        sectors_per_track: u8,
        sector_size: usize,
        data: Vec<u8>,
    ) -> Result<Self, GeometryError> {
        let expected_len =
            usize::from(tracks) * usize::from(sides) * usize::from(sectors_per_track) * sector_size;
        if data.len() != expected_len {
            return Err(GeometryError {
                tracks,
                sides,
                sectors_per_track,
                sector_size,
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self {
            tracks,
            sides,
            sectors_per_track,
            sector_size,
            write_protected: false,
            data,
        })
    }

    /// A freshly formatted image with every data byte set to the filler
    /// pattern written by the formatter.
    #[must_use]
    pub fn blank(tracks: u8, sides: u8, sectors_per_track: u8, sector_size: usize) -> Self {
        let len =
            usize::from(tracks) * usize::from(sides) * usize::from(sectors_per_track) * sector_size;
        Self {
            tracks,
            sides,
            sectors_per_track,
            sector_size,
            write_protected: false,
            data: vec![0xE5; len],
        }
    }

    #[must_use]
    pub fn tracks(&self) -> u8 {
        self.tracks
    }

    #[must_use]
    pub fn sides(&self) -> u8 {
        self.sides
    }

    #[must_use]
    pub fn sectors_per_track(&self) -> u8 {
        self.sectors_per_track
    }

    #[must_use]
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    #[must_use]
    pub fn write_protected(&self) -> bool {
        self.write_protected
    }

    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    /// Raw image bytes in layout order.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, track: u8, side: u8, sector: u8) -> Option<usize> {
        if track >= self.tracks || side >= self.sides || sector >= self.sectors_per_track {
            return None;
        }
        let track_index = usize::from(track) * usize::from(self.sides) + usize::from(side);
        Some((track_index * usize::from(self.sectors_per_track) + usize::from(sector)) * self.sector_size)
    }

    /// The bytes of one sector, or `None` when the address falls outside
    /// the image geometry.
    #[must_use]
    pub fn read_sector(&self, track: u8, side: u8, sector: u8) -> Option<&[u8]> {
        let offset = self.offset(track, side, sector)?;
        Some(&self.data[offset..offset + self.sector_size])
    }

    /// Overwrites one sector. Returns `false` when the address falls
    /// outside the image geometry; short payloads leave the sector tail
    /// untouched.
    pub fn write_sector(&mut self, track: u8, side: u8, sector: u8, payload: &[u8]) -> bool {
        let Some(offset) = self.offset(track, side, sector) else {
            return false;
        };
        let len = payload.len().min(self.sector_size);
        self.data[offset..offset + len].copy_from_slice(&payload[..len]);
        true
    }
}
