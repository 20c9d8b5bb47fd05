//! Sample-level cursors over raw rows.
//!
//! Multi-byte samples are MSB first unless the endian is `Lsb`. Sub-byte and
//! odd-width samples are bit-packed MSB first, continuing across pixels
//! within one row; unpacked they are whole big or little endian integers
//! instead. Reads past the end of the buffer yield zero bits and
//! writes past the end are dropped, so short buffers never panic.

use super::{Endian, QuantumInfo};
use crate::pixel::{
    Quantum, QUANTUM_RANGE, clamp_to_quantum, quantum_range_for_depth, scale_any_to_quantum,
    scale_char_to_quantum, scale_long_to_quantum, scale_quantum_to_any, scale_quantum_to_char,
    scale_quantum_to_long,
};

/// One raw sample: an unsigned integer at the descriptor depth, or a float
/// already mapped onto the quantum scale.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Sample {
    Unsigned(u64),
    Float(f64),
}

/// Depth and format dispatch shared by import and export.
pub(crate) struct SampleFormat {
    depth: u32,
    float: bool,
    pack: bool,
    range: u64,
    minimum: f64,
    scale: f64,
    inverse_scale: f64,
}

impl SampleFormat {
    pub(crate) fn new(quantum: &QuantumInfo) -> Self {
        let scale = quantum.scale();
        Self {
            depth: quantum.depth(),
            float: quantum.is_float(),
            pack: quantum.pack(),
            range: quantum_range_for_depth(quantum.depth()),
            minimum: quantum.minimum(),
            scale,
            inverse_scale: if scale == 0.0 { 0.0 } else { 1.0 / scale },
        }
    }

    pub(crate) fn read(&self, r: &mut SampleReader<'_>) -> Sample {
        if self.float {
            return Sample::Float(match self.depth {
                16 => f64::from(QUANTUM_RANGE) * f64::from(half_to_single(r.read_u16())),
                32 => (f64::from(f32::from_bits(r.read_u32())) - self.minimum) * self.scale,
                _ => (f64::from_bits(r.read_u64()) - self.minimum) * self.scale,
            });
        }
        Sample::Unsigned(match self.depth {
            8 => u64::from(r.read_u8()),
            16 => u64::from(r.read_u16()),
            32 => u64::from(r.read_u32()),
            depth if !self.pack => r.read_uint(depth.div_ceil(8)) & self.range,
            depth => r.read_bits(depth),
        })
    }

    pub(crate) fn to_quantum(&self, sample: Sample) -> Quantum {
        match sample {
            Sample::Float(v) => clamp_to_quantum(v),
            Sample::Unsigned(v) => match self.depth {
                8 => scale_char_to_quantum(v as u8),
                16 => v as Quantum,
                32 => scale_long_to_quantum(v as u32),
                _ => scale_any_to_quantum(v, self.range),
            },
        }
    }

    /// Colormap index carried by a sample; integers are taken verbatim.
    pub(crate) fn to_index(&self, sample: Sample) -> usize {
        match sample {
            Sample::Float(v) => usize::from(clamp_to_quantum(v)),
            Sample::Unsigned(v) => usize::try_from(v).unwrap_or(usize::MAX),
        }
    }

    pub(crate) fn write_quantum(&self, w: &mut SampleWriter<'_>, quantum: Quantum) {
        if self.float {
            let v = f64::from(quantum);
            match self.depth {
                16 => w.write_u16(single_to_half((v / f64::from(QUANTUM_RANGE)) as f32)),
                32 => w.write_u32(((v * self.inverse_scale + self.minimum) as f32).to_bits()),
                _ => w.write_u64((v * self.inverse_scale + self.minimum).to_bits()),
            }
            return;
        }
        match self.depth {
            8 => w.write_u8(scale_quantum_to_char(quantum)),
            16 => w.write_u16(quantum),
            32 => w.write_u32(scale_quantum_to_long(quantum)),
            depth if !self.pack => {
                w.write_uint(scale_quantum_to_any(quantum, self.range), depth.div_ceil(8))
            }
            depth => w.write_bits(scale_quantum_to_any(quantum, self.range), depth),
        }
    }

    /// Write a colormap index; integers are written verbatim, saturating at
    /// the depth's range.
    pub(crate) fn write_index(&self, w: &mut SampleWriter<'_>, index: Quantum) {
        if self.float {
            self.write_quantum(w, index);
            return;
        }
        let index = u64::from(index).min(self.range);
        match self.depth {
            8 => w.write_u8(index as u8),
            16 => w.write_u16(index as u16),
            32 => w.write_u32(index as u32),
            depth if !self.pack => w.write_uint(index, depth.div_ceil(8)),
            depth => w.write_bits(index, depth),
        }
    }
}

pub(crate) struct SampleReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    bits: u32,
    current: u8,
    lsb: bool,
}

impl<'a> SampleReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            bytes,
            pos: 0,
            bits: 0,
            current: 0,
            lsb: endian == Endian::Lsb,
        }
    }

    #[inline]
    fn byte(&mut self) -> u8 {
        let b = self.bytes.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    #[inline]
    pub(crate) fn read_u8(&mut self) -> u8 {
        self.byte()
    }

    #[inline]
    pub(crate) fn read_u16(&mut self) -> u16 {
        let (a, b) = (self.byte(), self.byte());
        if self.lsb {
            u16::from_le_bytes([a, b])
        } else {
            u16::from_be_bytes([a, b])
        }
    }

    #[inline]
    pub(crate) fn read_u32(&mut self) -> u32 {
        let mut raw = [0u8; 4];
        for b in &mut raw {
            *b = self.byte();
        }
        if self.lsb {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        }
    }

    #[inline]
    pub(crate) fn read_u64(&mut self) -> u64 {
        let mut raw = [0u8; 8];
        for b in &mut raw {
            *b = self.byte();
        }
        if self.lsb {
            u64::from_le_bytes(raw)
        } else {
            u64::from_be_bytes(raw)
        }
    }

    /// An `n`-byte unsigned integer in the cursor's byte order.
    pub(crate) fn read_uint(&mut self, n: u32) -> u64 {
        let mut value = 0u64;
        for i in 0..n {
            let b = u64::from(self.byte());
            if self.lsb {
                value |= b << (8 * i);
            } else {
                value = (value << 8) | b;
            }
        }
        value
    }

    /// Read `depth` bits, MSB first.
    pub(crate) fn read_bits(&mut self, depth: u32) -> u64 {
        let mut value = 0u64;
        let mut remaining = depth;
        while remaining > 0 {
            if self.bits == 0 {
                self.current = self.byte();
                self.bits = 8;
            }
            let take = remaining.min(self.bits);
            remaining -= take;
            self.bits -= take;
            let chunk = u64::from(self.current >> self.bits) & ((1u64 << take) - 1);
            value = (value << take) | chunk;
        }
        value
    }

    /// Drop the rest of a partially consumed byte.
    #[inline]
    pub(crate) fn align(&mut self) {
        self.bits = 0;
    }

    pub(crate) fn skip(&mut self, n: usize) {
        self.align();
        self.pos = self.pos.saturating_add(n);
    }

    /// Bytes consumed so far, capped at the buffer length.
    #[cfg(test)]
    pub(crate) fn consumed(&self) -> usize {
        self.pos.min(self.bytes.len())
    }
}

pub(crate) struct SampleWriter<'a> {
    out: &'a mut [u8],
    pos: usize,
    bits: u32,
    lsb: bool,
}

impl<'a> SampleWriter<'a> {
    pub(crate) fn new(out: &'a mut [u8], endian: Endian) -> Self {
        Self {
            out,
            pos: 0,
            bits: 0,
            lsb: endian == Endian::Lsb,
        }
    }

    #[inline]
    fn byte(&mut self, b: u8) {
        if let Some(slot) = self.out.get_mut(self.pos) {
            *slot = b;
        }
        self.pos += 1;
    }

    fn bytes(&mut self, raw: &[u8]) {
        for &b in raw {
            self.byte(b);
        }
    }

    #[inline]
    pub(crate) fn write_u8(&mut self, value: u8) {
        self.byte(value);
    }

    pub(crate) fn write_u16(&mut self, value: u16) {
        if self.lsb {
            self.bytes(&value.to_le_bytes());
        } else {
            self.bytes(&value.to_be_bytes());
        }
    }

    pub(crate) fn write_u32(&mut self, value: u32) {
        if self.lsb {
            self.bytes(&value.to_le_bytes());
        } else {
            self.bytes(&value.to_be_bytes());
        }
    }

    pub(crate) fn write_u64(&mut self, value: u64) {
        if self.lsb {
            self.bytes(&value.to_le_bytes());
        } else {
            self.bytes(&value.to_be_bytes());
        }
    }

    pub(crate) fn write_uint(&mut self, value: u64, n: u32) {
        for i in 0..n {
            let shift = if self.lsb { 8 * i } else { 8 * (n - 1 - i) };
            self.byte((value >> shift) as u8);
        }
    }

    /// Write the low `depth` bits of `value`, MSB first.
    pub(crate) fn write_bits(&mut self, value: u64, depth: u32) {
        let mut remaining = depth;
        while remaining > 0 {
            if self.bits == 0
                && let Some(slot) = self.out.get_mut(self.pos)
            {
                *slot = 0;
            }
            let free = 8 - self.bits;
            let take = remaining.min(free);
            remaining -= take;
            let chunk = ((value >> remaining) & ((1u64 << take) - 1)) as u8;
            if let Some(slot) = self.out.get_mut(self.pos) {
                *slot |= chunk << (free - take);
            }
            self.bits += take;
            if self.bits == 8 {
                self.bits = 0;
                self.pos += 1;
            }
        }
    }

    /// Close a partially filled byte; its unused low bits stay zero.
    pub(crate) fn align(&mut self) {
        if self.bits > 0 {
            self.bits = 0;
            self.pos += 1;
        }
    }

    pub(crate) fn zeros(&mut self, n: usize) {
        self.align();
        for _ in 0..n {
            self.byte(0);
        }
    }

    /// Bytes produced so far, counting a partial byte, capped at the buffer.
    pub(crate) fn written(&self) -> usize {
        let total = self.pos + usize::from(self.bits > 0);
        total.min(self.out.len())
    }
}

/// IEEE 754 binary16 to binary32.
pub(crate) fn half_to_single(half: u16) -> f32 {
    let sign = u32::from(half >> 15) << 31;
    let exponent = u32::from((half >> 10) & 0x1f);
    let mantissa = u32::from(half & 0x3ff);
    let bits = match exponent {
        0 if mantissa == 0 => sign,
        0 => {
            // Subnormal: renormalise.
            let mut e: u32 = 113;
            let mut m = mantissa;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            sign | (e << 23) | ((m & 0x3ff) << 13)
        }
        0x1f => sign | 0x7f80_0000 | (mantissa << 13),
        _ => sign | ((exponent + 112) << 23) | (mantissa << 13),
    };
    f32::from_bits(bits)
}

/// IEEE 754 binary32 to binary16, rounding to nearest.
pub(crate) fn single_to_half(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x7f_ffff;
    if exponent == 0xff {
        let nan = if mantissa != 0 { 0x200 } else { 0 };
        return sign | 0x7c00 | nan;
    }
    let e = exponent - 127 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }
    if e <= 0 {
        if e < -10 {
            return sign;
        }
        let m = mantissa | 0x80_0000;
        let shift = (14 - e) as u32;
        let rounded = (m >> shift) + ((m >> (shift - 1)) & 1);
        return sign | rounded as u16;
    }
    let half = sign | ((e as u16) << 10) | (mantissa >> 13) as u16;
    if mantissa & 0x1000 != 0 { half + 1 } else { half }
}
