//! Logging macros.
//!
//! With the `defmt` feature every macro forwards to the matching `defmt`
//! level. Without it the arguments are type-checked against
//! `core::format_args!` and then dropped, so call sites stay identical on
//! hosted and embedded builds. Format strings must stick to the `{}` and
//! `{:?}` placeholders both backends understand.

#[cfg(not(feature = "defmt"))]
#[doc(hidden)]
#[inline(always)]
pub fn discard(_args: core::fmt::Arguments<'_>) {}

#[cfg(feature = "defmt")]
#[allow(unused_macros)]
macro_rules! tp_debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_macros)]
macro_rules! tp_debug {
    ($($arg:tt)*) => {{
        if false {
            $crate::log::discard(core::format_args!($($arg)*));
        }
    }};
}

#[cfg(feature = "defmt")]
#[allow(unused_macros)]
macro_rules! tp_info {
    ($($arg:tt)*) => { defmt::info!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_macros)]
macro_rules! tp_info {
    ($($arg:tt)*) => {{
        if false {
            $crate::log::discard(core::format_args!($($arg)*));
        }
    }};
}

#[cfg(feature = "defmt")]
#[allow(unused_macros)]
macro_rules! tp_warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_macros)]
macro_rules! tp_warn {
    ($($arg:tt)*) => {{
        if false {
            $crate::log::discard(core::format_args!($($arg)*));
        }
    }};
}

#[cfg(feature = "defmt")]
#[allow(unused_macros)]
macro_rules! tp_error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_macros)]
macro_rules! tp_error {
    ($($arg:tt)*) => {{
        if false {
            $crate::log::discard(core::format_args!($($arg)*));
        }
    }};
}
