//! Planar multichannel audio storage with SIMD aligned channels.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ops::{AddAssign, MulAssign, SubAssign};
use std::ptr::NonNull;

use crate::common::MEMORY_ALIGNMENT_BYTES;

/// Heap allocation of `f32` values with a guaranteed alignment.
///
/// `Vec<f32>` only guarantees the alignment of `f32` itself, which is not
/// enough to hand out channel base pointers on SIMD boundaries.
struct AlignedFloatVec {
    ptr: NonNull<f32>,
    len: usize,
}

// The buffer owns its allocation exclusively; sharing a reference across
// threads is as safe as sharing a slice.
unsafe impl Send for AlignedFloatVec {}
unsafe impl Sync for AlignedFloatVec {}

impl AlignedFloatVec {
    fn new_zeroed(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len,
            };
        }
        let layout = Layout::from_size_align(len * std::mem::size_of::<f32>(), MEMORY_ALIGNMENT_BYTES)
            .expect("invalid layout");
        // Safety: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<f32>()) else {
            handle_alloc_error(layout);
        };
        Self { ptr, len }
    }

    fn as_slice(&self) -> &[f32] {
        // Safety: the allocation holds `len` initialized floats.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        // Safety: the allocation holds `len` initialized floats and we
        // have exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedFloatVec {
    fn drop(&mut self) {
        if self.len != 0 {
            let layout =
                Layout::from_size_align(self.len * std::mem::size_of::<f32>(), MEMORY_ALIGNMENT_BYTES)
                    .expect("invalid layout");
            // Safety: allocated with the identical layout in `new_zeroed`.
            unsafe { dealloc(self.ptr.as_ptr().cast(), layout) };
        }
    }
}

/// Audio buffer that manages multichannel audio data in a planar format.
///
/// All channels are stored sequentially within a single consecutive chunk
/// of memory, with each channel base pointer aligned to
/// [`MEMORY_ALIGNMENT_BYTES`]. Individual channels may be disabled to skip
/// work; a disabled channel produces no reads or writes but still reports
/// its size.
///
/// The buffer never reallocates after construction.
pub struct AudioBuffer {
    num_frames: usize,
    /// Allocated frames per channel, `num_frames` rounded up to the
    /// alignment quantum.
    channel_stride: usize,
    data: AlignedFloatVec,
    enabled: Vec<bool>,
}

impl AudioBuffer {
    /// Creates a zeroed buffer of `num_channels` x `num_frames` samples.
    pub fn new(num_channels: usize, num_frames: usize) -> Self {
        let quantum = MEMORY_ALIGNMENT_BYTES / std::mem::size_of::<f32>();
        let channel_stride = if num_frames == 0 {
            0
        } else {
            num_frames.div_ceil(quantum) * quantum
        };
        Self {
            num_frames,
            channel_stride,
            data: AlignedFloatVec::new_zeroed(num_channels * channel_stride),
            enabled: vec![true; num_channels],
        }
    }

    /// Returns the number of audio channels.
    pub fn num_channels(&self) -> usize {
        self.enabled.len()
    }

    /// Returns the number of frames per channel.
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Returns the number of allocated frames per channel. This may differ
    /// from `num_frames` to keep every channel base pointer aligned.
    pub fn channel_stride(&self) -> usize {
        self.channel_stride
    }

    /// Returns the samples of `channel`.
    pub fn channel(&self, channel: usize) -> &[f32] {
        debug_assert!(self.enabled[channel]);
        let begin = channel * self.channel_stride;
        &self.data.as_slice()[begin..begin + self.num_frames]
    }

    /// Returns the samples of `channel`, mutably.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        debug_assert!(self.enabled[channel]);
        let begin = channel * self.channel_stride;
        &mut self.data.as_mut_slice()[begin..begin + self.num_frames]
    }

    /// Enables or disables a channel. Pointwise operations and `clear`
    /// skip disabled channels.
    pub fn set_channel_enabled(&mut self, channel: usize, enabled: bool) {
        self.enabled[channel] = enabled;
    }

    /// Returns whether `channel` is enabled.
    pub fn is_channel_enabled(&self, channel: usize) -> bool {
        self.enabled[channel]
    }

    /// Fills all channels with zeros and re-enables them.
    pub fn clear(&mut self) {
        self.enabled.iter_mut().for_each(|e| *e = true);
        self.data.as_mut_slice().fill(0.0);
    }

    /// Copies the sample data of `other` into `self`. Both buffers must
    /// have identical shape.
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        assert_eq!(self.num_channels(), other.num_channels());
        assert_eq!(self.num_frames(), other.num_frames());
        for channel in 0..self.num_channels() {
            if self.enabled[channel] && other.enabled[channel] {
                self.channel_mut(channel).copy_from_slice(other.channel(channel));
            }
        }
    }

    /// Copies per-channel sample vectors into `self`. The outer slice
    /// must hold exactly `num_channels` vectors of `num_frames` samples.
    pub fn assign_from_slices(&mut self, data: &[Vec<f32>]) {
        assert_eq!(self.num_channels(), data.len());
        for (channel, samples) in data.iter().enumerate() {
            assert_eq!(samples.len(), self.num_frames);
            self.channel_mut(channel).copy_from_slice(samples);
        }
    }

    /// Adds `samples` into the given channel.
    pub fn accumulate_channel(&mut self, channel: usize, samples: &[f32]) {
        assert_eq!(samples.len(), self.num_frames);
        if !self.enabled[channel] {
            return;
        }
        for (out, sample) in self.channel_mut(channel).iter_mut().zip(samples) {
            *out += sample;
        }
    }
}

impl AddAssign<&AudioBuffer> for AudioBuffer {
    fn add_assign(&mut self, other: &AudioBuffer) {
        assert_eq!(self.num_channels(), other.num_channels());
        assert_eq!(self.num_frames(), other.num_frames());
        for channel in 0..self.num_channels() {
            if !self.enabled[channel] || !other.enabled[channel] {
                continue;
            }
            for (out, sample) in self.channel_mut(channel).iter_mut().zip(other.channel(channel)) {
                *out += sample;
            }
        }
    }
}

impl SubAssign<&AudioBuffer> for AudioBuffer {
    fn sub_assign(&mut self, other: &AudioBuffer) {
        assert_eq!(self.num_channels(), other.num_channels());
        assert_eq!(self.num_frames(), other.num_frames());
        for channel in 0..self.num_channels() {
            if !self.enabled[channel] || !other.enabled[channel] {
                continue;
            }
            for (out, sample) in self.channel_mut(channel).iter_mut().zip(other.channel(channel)) {
                *out -= sample;
            }
        }
    }
}

impl MulAssign<&AudioBuffer> for AudioBuffer {
    fn mul_assign(&mut self, other: &AudioBuffer) {
        assert_eq!(self.num_channels(), other.num_channels());
        assert_eq!(self.num_frames(), other.num_frames());
        for channel in 0..self.num_channels() {
            if !self.enabled[channel] || !other.enabled[channel] {
                continue;
            }
            for (out, sample) in self.channel_mut(channel).iter_mut().zip(other.channel(channel)) {
                *out *= sample;
            }
        }
    }
}
