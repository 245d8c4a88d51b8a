#![allow(clippy::too_many_arguments)]
// Wrong clippy convention; check
// https://rust-lang.github.io/api-guidelines/naming.html
#![allow(clippy::wrong_self_convention)]

pub mod arith;
pub mod array;
pub mod config;
pub mod divides;
pub mod error;
pub mod ev;
pub mod gcd;
pub mod gcd_info;
pub mod heap;
pub mod mono;
pub mod pool;
pub mod poly;
pub mod ti;

pub mod prelude {
    pub use crate::error::{PolyError, PolyResult};
    pub use crate::ev::{ExponentVector, FieldWidth};
    pub use crate::gcd_info::GcdInfo;
    pub use crate::mono::MonomialOrder;
    pub use crate::pool::{PoolHandle, SequentialPool, ThreadPool};
    pub use crate::poly::SparsePoly;
    pub use crate::ti::TaggedInt;
}
