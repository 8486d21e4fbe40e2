pub use crate::array::{BinnedArray, Element, FileBinnedArray};
pub use crate::bits::{BinnedBitset, BitQuery, Bitset};
pub use crate::index::{Index, IndexFile, Indexes};
pub use crate::intervals::Interval;
pub use crate::source::Source;
