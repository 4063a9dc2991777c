//! The "ask for the size, then fill" calling convention.
//!
//! Enumeration and formatting exports are first called without a buffer to
//! learn how many elements they need. `LOCALDB_ERROR_INSUFFICIENT_BUFFER` on
//! that sizing call is expected. They are then called again with a buffer of
//! exactly the reported size.

use sqllocaldb_errors::ErrorCode;

/// Buffer filled by the second call of the sizing convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedBuffer<T> {
    /// The buffer, `count * stride` elements long.
    pub data: Vec<T>,
    /// Element count reported by the filling call.
    pub count: usize,
}

impl<T> SizedBuffer<T> {
    fn empty() -> Self {
        Self {
            data: Vec::new(),
            count: 0,
        }
    }
}

/// Run the two-call sizing convention.
///
/// `call` receives no buffer and a zero count on the sizing call, then a buffer of
/// `count * stride` elements together with that count. It returns the raw
/// result code of the native call.
///
/// A sizing call that succeeds, or that reports a zero count, yields an empty
/// buffer. Any other failure code is returned as `Err`.
///
/// # Examples
///
/// ```
/// use sqllocaldb_errors::ErrorCode;
/// use sqllocaldb_interop::sizing::call_with_sized_buffer;
///
/// let names = ["a", "b", "c"];
/// let filled = call_with_sized_buffer::<u8>(4, |buffer, count| match buffer {
///     None => {
///         *count = names.len() as u32;
///         ErrorCode::InsufficientBuffer.code()
///     }
///     Some(buffer) => {
///         assert_eq!(buffer.len(), 12);
///         0
///     }
/// });
/// assert_eq!(filled.map(|b| b.count), Ok(3));
/// ```
pub fn call_with_sized_buffer<T: Clone + Default>(
    stride: usize,
    mut call: impl FnMut(Option<&mut [T]>, &mut u32) -> i32,
) -> Result<SizedBuffer<T>, i32> {
    let mut count = 0u32;
    let code = call(None, &mut count);

    if code == 0 {
        return Ok(SizedBuffer::empty());
    }
    if !ErrorCode::InsufficientBuffer.matches(code) {
        return Err(code);
    }
    if count == 0 {
        return Ok(SizedBuffer::empty());
    }

    let length = (count as usize).saturating_mul(stride);
    let mut data = vec![T::default(); length];

    let code = call(Some(&mut data), &mut count);
    if code != 0 {
        return Err(code);
    }

    Ok(SizedBuffer {
        data,
        count: count as usize,
    })
}
