use chainidx_types::{BinaryDecode, BinaryEncode, CodecError, DataId};
use std::io::{Read, Write};

/// Discriminates the payload an [`Envelope`] points at (spec.md §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    Block = 0,
    Transaction = 1,
    Output = 2,
    WalletFreeForAll = 3,
    WalletSingleSignature = 4,
    WalletMultiSignature = 5,
    AtomicSwapContract = 6,
}

impl ObjectType {
    fn from_tag(tag: u8) -> chainidx_types::codec::Result<Self> {
        Ok(match tag {
            0 => ObjectType::Block,
            1 => ObjectType::Transaction,
            2 => ObjectType::Output,
            3 => ObjectType::WalletFreeForAll,
            4 => ObjectType::WalletSingleSignature,
            5 => ObjectType::WalletMultiSignature,
            6 => ObjectType::AtomicSwapContract,
            other => return Err(CodecError::UnknownTag { tag: other }),
        })
    }
}

/// The tiny record kept under an object id: enough to find and type-check
/// the full payload kept under `data_id` (spec.md §4.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub object_type: ObjectType,
    /// A format version byte, independent of the codec's own forward
    /// compatibility story, for schema evolution (spec.md §6 "Format
    /// versioning").
    pub object_version: u8,
    pub data_id: DataId,
}

const CURRENT_OBJECT_VERSION: u8 = 1;

impl Envelope {
    pub fn new(object_type: ObjectType, data_id: DataId) -> Self {
        Envelope {
            object_type,
            object_version: CURRENT_OBJECT_VERSION,
            data_id,
        }
    }
}

impl BinaryEncode for Envelope {
    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.object_type as u8).encode(writer)?;
        self.object_version.encode(writer)?;
        self.data_id.encode(writer)
    }
}

impl BinaryDecode for Envelope {
    fn decode<R: Read>(reader: &mut R) -> chainidx_types::codec::Result<Self> {
        let tag = u8::decode(reader)?;
        let object_type = ObjectType::from_tag(tag)?;
        let object_version = u8::decode(reader)?;
        let data_id = DataId::decode(reader)?;
        Ok(Envelope {
            object_type,
            object_version,
            data_id,
        })
    }
}
