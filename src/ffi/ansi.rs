// Decoder for the engine's null-terminated single-byte strings.
//
// Runs once per line and once per word, so the terminator search works a word
// at a time and only drops to byte comparisons inside the word that holds the
// terminator.

use libc::c_char;

const WORD: usize = size_of::<u64>();
const LO: u64 = 0x0101_0101_0101_0101;
const HI: u64 = 0x8080_8080_8080_8080;

/// True if any byte of `v` is zero.
#[inline]
const fn has_zero_byte(v: u64) -> bool {
    v.wrapping_sub(LO) & !v & HI != 0
}

/// Length of the string at `ptr`, excluding the terminator.
///
/// Bytes are read individually until `ptr + len` is 8-byte aligned, then a
/// word at a time. An aligned word never straddles a page boundary, so the
/// over-read past the terminator (at most 7 bytes) stays in a mapped page.
///
/// # Safety
/// `ptr` must be non-null and point to a NUL-terminated buffer.
unsafe fn strlen(ptr: *const u8) -> usize {
    let mut len = 0usize;

    while (ptr as usize + len) % WORD != 0 {
        if unsafe { *ptr.add(len) } == 0 {
            return len;
        }
        len += 1;
    }

    loop {
        let chunk = unsafe { ptr.add(len).cast::<u64>().read() };
        if has_zero_byte(chunk) {
            break;
        }
        len += WORD;
    }

    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }
    len
}

/// Copies a native NUL-terminated string into an owned `String`.
///
/// A null pointer yields an empty string. A buffer that is valid UTF-8 is
/// kept as is; otherwise every byte is taken as one Latin-1 character, so no
/// byte is lost.
///
/// # Safety
/// A non-null `ptr` must point to a NUL-terminated buffer that stays valid
/// for the duration of this call. The returned value does not borrow it.
pub unsafe fn ansi_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let ptr = ptr.cast::<u8>();
    let bytes = unsafe { std::slice::from_raw_parts(ptr, strlen(ptr)) };
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
