use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::message::{BackendFrame, FrontendMessage};

/// PostgreSQL message codec for use with tokio Framed
#[derive(Debug, Default)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = BackendFrame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(BackendFrame::decode(src))
    }
}

impl Encoder<FrontendMessage> for MessageCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: FrontendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}
