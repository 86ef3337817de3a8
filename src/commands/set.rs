use bytes::Bytes;
use tokio::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Set `key` to hold `value`, replacing any previous value and expiration. With `PX
/// milliseconds` the key expires that many milliseconds after the command runs.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub ttl: Option<Duration>,
}

impl Executable for Set {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        let mut store = store.lock();

        store.set(self.key.clone(), self.value);
        if let Some(ttl) = self.ttl {
            store.set_expiry(&self.key, ttl);
        }

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        let ttl = match parser.remaining() {
            0 => None,
            2 => {
                let option = parser.next_bytes()?;
                if !option.eq_ignore_ascii_case(b"PX") {
                    return Err(CommandParserError::Syntax);
                }

                let millis = parser.next_integer()?;
                if millis <= 0 {
                    return Err(CommandParserError::InvalidExpireTime {
                        command: "set".to_string(),
                    });
                }

                Some(Duration::from_millis(millis as u64))
            }
            _ => return Err(CommandParserError::Syntax),
        };

        Ok(Self { key, value, ttl })
    }
}
