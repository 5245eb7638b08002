// src/macros.rs

/// Plain payload types: a handler returning one fulfills with it.
#[doc(hidden)]
#[macro_export]
macro_rules! impl_into_resolution {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::IntoResolution for $t {
                #[inline]
                fn into_resolution(self) -> $crate::Resolution {
                    $crate::Resolution::Value($crate::Value::new(self))
                }
            }
        )+
    };
}

/// Builds a `Vec<Resolution>` out of mixed inputs, for the combinators.
///
/// ```ignore
/// let all = promise_scope::ops::all(resolutions![1_i32, Promise::delay(d), "x"]);
/// ```
#[macro_export]
macro_rules! resolutions {
    () => { ::std::vec::Vec::<$crate::Resolution>::new() };
    ($( $item:expr ),+ $(,)?) => {{
        let mut items: ::std::vec::Vec<$crate::Resolution> = ::std::vec::Vec::new();
        $(
            items.push($crate::IntoResolution::into_resolution($item));
        )+
        items
    }};
}
