//! Traits and impls used to read/write data to/from the wire.

/**
	trait for data types than can be packed/unpacked to/from a process data record or an SDO

	all values are little endian on the wire, as required by CoE
*/
pub trait PduData: Sized {
    type Packed: Storage;

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()>;
    fn unpack(src: &[u8]) -> PackingResult<Self>;

    fn packed_size() -> usize  {Self::Packed::LEN}
}

/** Enum to identify and raise adapted error raised by this package
*/
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PackingError {
    BadSize(usize, &'static str),
    InvalidValue(&'static str),
}

pub type PackingResult<T> = Result<T, PackingError>;


/// fixed size byte buffer able to hold the packed form of a [PduData]
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> {
    const LEN: usize;
    fn zeroed() -> Self;
}
impl<const N: usize> Storage for [u8; N] {
    const LEN: usize = N;
    fn zeroed() -> Self {[0; N]}
}

/// macro implementing [PduData] for a struct generated with `bilge`, through the integer it converts from/to
macro_rules! bilge_pdudata {
    ($t: ty, $int: ty) => { impl crate::data::PduData for $t {
        type Packed = <$int as crate::data::PduData>::Packed;

        fn pack(&self, dst: &mut [u8]) -> crate::data::PackingResult<()> {
            <$int as crate::data::PduData>::pack(&<$int>::from(*self), dst)
        }
        fn unpack(src: &[u8]) -> crate::data::PackingResult<Self> {
            Ok(Self::from(<$int as crate::data::PduData>::unpack(src)?))
        }
    }};
}
pub(crate) use bilge_pdudata;

/// macro implementing [PduData] for numeric types
macro_rules! num_pdudata {
	($t: ty) => { impl crate::data::PduData for $t {
            type Packed = [u8; core::mem::size_of::<$t>()];

            fn pack(&self, dst: &mut [u8]) -> crate::data::PackingResult<()> {
				let len = dst.len();
				dst.get_mut(.. core::mem::size_of::<$t>())
					.ok_or(crate::data::PackingError::BadSize(len, "no room for integer"))?
					.copy_from_slice(&self.to_le_bytes());
				Ok(())
			}
			fn unpack(src: &[u8]) -> crate::data::PackingResult<Self> {
				Ok(Self::from_le_bytes(src
					.get(.. core::mem::size_of::<$t>())
					.and_then(|bytes| bytes.try_into().ok())
					.ok_or(crate::data::PackingError::BadSize(src.len(), "not enough bytes for integer"))?
					))
			}
		}};
}

num_pdudata!(u8);
num_pdudata!(u16);
num_pdudata!(u32);
num_pdudata!(u64);
num_pdudata!(i8);
num_pdudata!(i16);
num_pdudata!(i32);
num_pdudata!(i64);
num_pdudata!(f32);
num_pdudata!(f64);



/** helper to read/write sequencial data from/to a byte slice

    It is close to what [std::io::Cursor] is doing, but works directly with [PduData] values and never allocates.

    Depending on the mutability of the slice this struct is built on, different capabilities are provided.
*/
pub struct Cursor<T> {
    position: usize,
    data: T,
}
impl<T> Cursor<T> {
    /// create a new cursor starting at position zero in the given slice
    pub fn new(data: T) -> Self   {Self{position: 0, data}}
    /// current position in the read/write slice
    ///
    /// bytes before this position are considered read or written, and bytes after are coming for use in next read/write calls
    pub fn position(&self) -> usize   {self.position}
}
impl<'a> Cursor<&'a [u8]> {
    /// read the next coming bytes with a [PduData] value, and increment the position
    pub fn unpack<T: PduData>(&mut self) -> PackingResult<T> {
        let value = T::unpack(self.data.get(self.position ..).unwrap_or_default())?;
        self.position += T::Packed::LEN;
        Ok(value)
    }
}
impl<'a> Cursor<&'a mut [u8]> {
    /// write the next coming bytes with a [PduData] value, and increment the position
    pub fn pack<T: PduData>(&mut self, value: &T) -> PackingResult<()> {
        let len = self.data.len();
        value.pack(self.data.get_mut(self.position ..)
            .ok_or(PackingError::BadSize(len, "cursor beyond buffer"))?)?;
        self.position += T::Packed::LEN;
        Ok(())
    }
    /// write the next coming bytes with the given slice, and increment the position
    pub fn write(&mut self, value: &[u8]) -> PackingResult<()> {
        let len = self.data.len();
        self.data.get_mut(self.position ..)
            .and_then(|remain| remain.get_mut(.. value.len()))
            .ok_or(PackingError::BadSize(len, "not enough room for slice"))?
            .copy_from_slice(value);
        self.position += value.len();
        Ok(())
    }
}
