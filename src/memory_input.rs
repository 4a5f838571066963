//! FFmpeg input over a borrowed byte slice.
//!
//! FFmpeg demuxers normally read from a URL. [`MemoryInput`] instead wires a
//! custom AVIO context whose read and seek callbacks operate over the
//! caller's buffer, so no temporary file is ever written and the encoded
//! video is never copied.

use std::ffi::{c_int, c_void};
use std::ptr;

use ffmpeg_next::Error as FfmpegError;
use ffmpeg_next::format::context::Input;
use ffmpeg_sys_next::{
    AVERROR_EOF, AVFMT_FLAG_CUSTOM_IO, AVIOContext, AVSEEK_FORCE, AVSEEK_SIZE, av_free, av_freep,
    av_malloc, avformat_alloc_context, avformat_close_input, avformat_find_stream_info,
    avformat_open_input, avio_alloc_context, avio_context_free,
};

use crate::error::LoadvidError;

/// Size of the scratch buffer FFmpeg reads through.
const IO_BUFFER_SIZE: usize = 32 * 1024;

const SEEK_SET: c_int = 0;
const SEEK_CUR: c_int = 1;
const SEEK_END: c_int = 2;

/// Read cursor handed to FFmpeg as the AVIO `opaque` pointer.
pub(crate) struct MemoryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> MemoryReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn read_into(&mut self, destination: &mut [u8]) -> usize {
        let remaining = &self.data[self.position..];
        let count = remaining.len().min(destination.len());
        destination[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        count
    }

    /// Returns the new position, or `None` when it would leave the buffer.
    fn seek(&mut self, offset: i64, whence: c_int) -> Option<i64> {
        let length = self.data.len() as i64;
        let base = match whence {
            SEEK_SET => 0,
            SEEK_CUR => self.position as i64,
            SEEK_END => length,
            _ => return None,
        };
        let target = base.checked_add(offset)?;
        if !(0..=length).contains(&target) {
            return None;
        }
        self.position = target as usize;
        Some(target)
    }
}

unsafe extern "C" fn read_packet(opaque: *mut c_void, buffer: *mut u8, buffer_size: c_int) -> c_int {
    if opaque.is_null() || buffer.is_null() || buffer_size <= 0 {
        return AVERROR_EOF;
    }
    let reader = unsafe { &mut *(opaque as *mut MemoryReader<'_>) };
    let destination = unsafe { std::slice::from_raw_parts_mut(buffer, buffer_size as usize) };
    match reader.read_into(destination) {
        0 => AVERROR_EOF,
        count => count as c_int,
    }
}

unsafe extern "C" fn seek_packet(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    if opaque.is_null() {
        return -1;
    }
    let reader = unsafe { &mut *(opaque as *mut MemoryReader<'_>) };
    if whence & AVSEEK_SIZE as c_int != 0 {
        return reader.data.len() as i64;
    }
    reader
        .seek(offset, whence & !(AVSEEK_FORCE as c_int))
        .unwrap_or(-1)
}

/// Owns the AVIO context and the reader it points at.
struct MemoryIo<'a> {
    context: *mut AVIOContext,
    reader: *mut MemoryReader<'a>,
}

impl Drop for MemoryIo<'_> {
    fn drop(&mut self) {
        unsafe {
            if !self.context.is_null() {
                // FFmpeg may have swapped the scratch buffer for a larger one.
                av_freep(&mut (*self.context).buffer as *mut *mut u8 as *mut c_void);
                avio_context_free(&mut self.context);
            }
            if !self.reader.is_null() {
                drop(Box::from_raw(self.reader));
                self.reader = ptr::null_mut();
            }
        }
    }
}

/// An opened FFmpeg demuxer reading from a borrowed buffer.
///
/// Field order matters: the format context must be closed before the I/O
/// context it reads through is freed.
pub(crate) struct MemoryInput<'a> {
    input: Input,
    _io: MemoryIo<'a>,
}

impl<'a> MemoryInput<'a> {
    /// Probe and open `data` as a media container.
    ///
    /// # Errors
    ///
    /// Returns [`LoadvidError::Container`] if FFmpeg cannot recognise or
    /// parse the container.
    pub(crate) fn open(data: &'a [u8]) -> Result<Self, LoadvidError> {
        ffmpeg_next::init().map_err(|error| {
            LoadvidError::Container(format!("FFmpeg initialisation failed: {error}"))
        })?;

        let reader = Box::into_raw(Box::new(MemoryReader::new(data)));
        let mut io = MemoryIo {
            context: ptr::null_mut(),
            reader,
        };

        unsafe {
            let buffer = av_malloc(IO_BUFFER_SIZE) as *mut u8;
            if buffer.is_null() {
                return Err(LoadvidError::Container(
                    "failed to allocate I/O buffer".to_string(),
                ));
            }

            io.context = avio_alloc_context(
                buffer,
                IO_BUFFER_SIZE as c_int,
                0,
                reader as *mut c_void,
                Some(read_packet),
                None,
                Some(seek_packet),
            );
            if io.context.is_null() {
                av_free(buffer as *mut c_void);
                return Err(LoadvidError::Container(
                    "failed to allocate I/O context".to_string(),
                ));
            }

            let mut format_context = avformat_alloc_context();
            if format_context.is_null() {
                return Err(LoadvidError::Container(
                    "failed to allocate format context".to_string(),
                ));
            }
            (*format_context).pb = io.context;
            (*format_context).flags |= AVFMT_FLAG_CUSTOM_IO as c_int;

            // On failure FFmpeg frees the format context itself.
            let status = avformat_open_input(
                &mut format_context,
                ptr::null(),
                ptr::null(),
                ptr::null_mut(),
            );
            if status < 0 {
                return Err(LoadvidError::Container(
                    FfmpegError::from(status).to_string(),
                ));
            }

            let status = avformat_find_stream_info(format_context, ptr::null_mut());
            if status < 0 {
                avformat_close_input(&mut format_context);
                return Err(LoadvidError::Container(format!(
                    "could not read stream info: {}",
                    FfmpegError::from(status)
                )));
            }

            log::debug!("Opened in-memory container ({} bytes)", data.len());

            Ok(Self {
                input: Input::wrap(format_context),
                _io: io,
            })
        }
    }

    pub(crate) fn input(&self) -> &Input {
        &self.input
    }

    pub(crate) fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }
}
