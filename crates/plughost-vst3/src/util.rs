//! String and GUID conversions at the ABI boundary.

use std::ffi::c_char;

use vst3::Steinberg::char16;
use vst3::Steinberg::TUID;

/// Read a null-terminated UTF-16 buffer (`String128` and friends).
pub fn utf16_to_string(buf: &[char16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

/// Write `src` into a fixed UTF-16 buffer, truncating and always null-terminating.
pub fn copy_utf16(src: &str, dst: &mut [char16]) {
    let Some(max) = dst.len().checked_sub(1) else {
        return;
    };
    let mut len = 0;
    for (unit, slot) in src.encode_utf16().take(max).zip(dst.iter_mut()) {
        *slot = unit as char16;
        len += 1;
    }
    dst[len] = 0;
}

/// Read a null-terminated `char8` buffer (class categories, names, vendors).
pub fn c_chars_to_string(buf: &[c_char]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    let bytes: Vec<u8> = buf[..end].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn copy_c_chars(src: &str, dst: &mut [c_char]) {
    let Some(max) = dst.len().checked_sub(1) else {
        return;
    };
    let bytes = src.as_bytes();
    let len = bytes.len().min(max);
    for (slot, &b) in dst.iter_mut().zip(&bytes[..len]) {
        *slot = b as c_char;
    }
    dst[len] = 0;
}

/// Interface ids are `[u8; 16]`, `createInstance` wants a `TUID`.
pub fn guid_to_tuid(guid: &[u8; 16]) -> TUID {
    let mut tuid: TUID = [0; 16];
    for (dst, &src) in tuid.iter_mut().zip(guid) {
        *dst = src as c_char;
    }
    tuid
}

pub fn tuid_to_bytes(tuid: &TUID) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (dst, &src) in out.iter_mut().zip(tuid) {
        *dst = src as u8;
    }
    out
}
