use crate::datatypes::{LenPrefix, ReadBuf, WriteBuf};

use super::{Message, MessageError};

/// An authenticated console command, client to server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RconCommand {
    pub password: String,
    pub command: String,
}

/// A line of console output, server to client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RconReply {
    pub text: String,
}

impl Message for RconCommand {
    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), MessageError> {
        buf.write_str(&self.password, LenPrefix::U16)?;
        buf.write_str(&self.command, LenPrefix::I16)?;
        Ok(())
    }

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, MessageError> {
        Ok(Self {
            password: buf.read_str(LenPrefix::U16)?,
            command: buf.read_str(LenPrefix::I16)?,
        })
    }
}

impl Message for RconReply {
    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), MessageError> {
        buf.write_str(&self.text, LenPrefix::I16)?;
        Ok(())
    }

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, MessageError> {
        Ok(Self {
            text: buf.read_str(LenPrefix::I16)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::datatypes::BufError;

    #[test]
    fn command_layout() {
        let command = RconCommand {
            password: "pw".to_owned(),
            command: "cmdlist".to_owned(),
        };
        let bytes = command.to_bytes().unwrap();
        assert_eq!(
            &bytes[..],
            &[2, 0, b'p', b'w', 7, 0, b'c', b'm', b'd', b'l', b'i', b's', b't']
        );
    }

    #[test]
    fn reply_with_negative_length() {
        let payload = Bytes::from_static(&[0x00, 0x80, b'x']);
        assert_eq!(
            RconReply::from_bytes(payload),
            Err(MessageError::BufError(BufError::InvalidLength(-32768)))
        );
    }

    #[test]
    fn command_too_long() {
        let command = RconCommand {
            password: String::new(),
            command: "a".repeat(40_000),
        };
        assert!(matches!(
            command.to_bytes(),
            Err(MessageError::BufError(BufError::InvalidLength(40_000)))
        ));
    }
}
