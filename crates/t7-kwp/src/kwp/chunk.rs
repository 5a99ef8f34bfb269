//! Chunk codec for messages that span several CAN frames
//!
//! Every frame carries a control byte, an address byte and up to six message
//! bytes. The control byte holds the first-chunk flag (0x40), the
//! confirmation-requested flag (0x80) and a six bit counter of the chunks
//! still to follow.

use crate::error::KwpError;
use crate::transport::{CanFrame, FrameKind, MAX_FRAME_LEN};

use super::can_id;

pub const FIRST_CHUNK: u8 = 0x40;
pub const CONFIRMATION_REQUESTED: u8 = 0x80;
pub const COUNTER_MASK: u8 = 0x3F;

/// Message bytes carried by one frame
pub const CHUNK_PAYLOAD: usize = 6;

/// Address byte on frames sent by the tester
pub const TESTER_ADDRESS: u8 = 0xA1;
/// Address byte on frames sent by the ECU
pub const ECU_ADDRESS: u8 = 0xBF;

/// Split `message` into chunk frames addressed to `id`
///
/// All chunks but the last request a confirmation and are marked
/// [`FrameKind::ResponseRequired`]; the last one is a plain send.
pub fn encode_chunks(id: u32, address: u8, message: &[u8]) -> Vec<CanFrame> {
    let count = chunk_count(message.len());

    message
        .chunks(CHUNK_PAYLOAD)
        .enumerate()
        .map(|(i, slice)| {
            let last = i + 1 == count;
            let mut control = ((count - i - 1) as u8) & COUNTER_MASK;
            if i == 0 {
                control |= FIRST_CHUNK;
            }
            if !last {
                control |= CONFIRMATION_REQUESTED;
            }

            let mut data = vec![0u8; MAX_FRAME_LEN];
            data[0] = control;
            data[1] = address;
            data[2..2 + slice.len()].copy_from_slice(slice);

            let kind = if last {
                FrameKind::Outgoing
            } else {
                FrameKind::ResponseRequired
            };
            CanFrame::new(id, data, kind)
        })
        .collect()
}

/// Tester acknowledgement for a received chunk with control byte `control`
pub fn acknowledgement(control: u8) -> CanFrame {
    CanFrame::response_required(
        can_id::TESTER_ACK,
        vec![
            FIRST_CHUNK,
            TESTER_ADDRESS,
            COUNTER_MASK,
            control & !FIRST_CHUNK,
            0x00,
            0x00,
            0x00,
            0x00,
        ],
    )
}

fn chunk_count(len: usize) -> usize {
    (len + CHUNK_PAYLOAD - 1) / CHUNK_PAYLOAD
}

fn violation(msg: String) -> KwpError {
    KwpError::ProtocolViolation(msg)
}

/// Reassembles an inbound chunked message
///
/// The first frame declares the message length at byte 2; the message is
/// that length byte followed by the declared number of bytes. The remaining
/// byte count and the descending counter are cross-checked after every
/// frame, and any disagreement fails the read.
#[derive(Debug)]
pub struct ChunkReader {
    message: Vec<u8>,
    remaining: usize,
    counter: u8,
    last_control: u8,
}

impl ChunkReader {
    pub fn new(first: &CanFrame) -> Result<Self, KwpError> {
        let control = control_byte(first)?;
        if control & FIRST_CHUNK == 0 {
            return Err(violation(format!("{} lacks the first-chunk flag", first)));
        }
        let declared = first
            .byte(2)
            .ok_or_else(|| violation(format!("{} carries no length byte", first)))?;

        let total = declared as usize + 1;
        let mut reader = Self {
            message: Vec::with_capacity(total),
            remaining: total,
            counter: control & COUNTER_MASK,
            last_control: control,
        };
        reader.take(first)?;
        reader.check_counter(first)?;
        Ok(reader)
    }

    /// Feed the next continuation frame
    pub fn push(&mut self, frame: &CanFrame) -> Result<(), KwpError> {
        if self.is_complete() {
            return Err(violation(format!("{} arrived after the message ended", frame)));
        }
        let control = control_byte(frame)?;
        if control & FIRST_CHUNK != 0 {
            return Err(violation(format!("{} restarts the message", frame)));
        }
        let counter = control & COUNTER_MASK;
        if counter + 1 != self.counter {
            return Err(violation(format!(
                "{}: counter {} does not follow {}",
                frame, counter, self.counter
            )));
        }
        self.counter = counter;
        self.last_control = control;
        self.take(frame)?;
        self.check_counter(frame)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Control byte of the most recent frame, echoed in the acknowledgement
    pub fn last_control(&self) -> u8 {
        self.last_control
    }

    /// Message bytes still expected
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// The reassembled message, starting with its length byte
    pub fn into_message(self) -> Result<Vec<u8>, KwpError> {
        if !self.is_complete() {
            return Err(violation(format!(
                "message incomplete, {} bytes missing",
                self.remaining
            )));
        }
        Ok(self.message)
    }

    fn take(&mut self, frame: &CanFrame) -> Result<(), KwpError> {
        let n = self.remaining.min(CHUNK_PAYLOAD);
        let bytes = frame.data().get(2..2 + n).ok_or_else(|| {
            violation(format!("{} is too short for {} message bytes", frame, n))
        })?;
        self.message.extend_from_slice(bytes);
        self.remaining -= n;
        Ok(())
    }

    fn check_counter(&self, frame: &CanFrame) -> Result<(), KwpError> {
        let frames_left = chunk_count(self.remaining);
        if frames_left != self.counter as usize {
            return Err(violation(format!(
                "{}: counter {} but {} bytes remain",
                frame, self.counter, self.remaining
            )));
        }
        Ok(())
    }
}

fn control_byte(frame: &CanFrame) -> Result<u8, KwpError> {
    frame
        .byte(0)
        .ok_or_else(|| violation(format!("{} is empty", frame)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Mark every frame as confirmation-requested, as the ECU does
    fn ecu_frames(message: &[u8]) -> Vec<CanFrame> {
        encode_chunks(can_id::RESPONSE, ECU_ADDRESS, message)
            .into_iter()
            .map(|mut f| {
                f.data[0] |= CONFIRMATION_REQUESTED;
                f
            })
            .collect()
    }

    fn message_of(len: usize) -> Vec<u8> {
        // length byte, then `len - 1` declared bytes
        let mut msg = vec![(len - 1) as u8];
        msg.extend((1..len).map(|i| i as u8));
        msg
    }

    #[test]
    fn encoder_sets_flags_and_counters() {
        let message: Vec<u8> = (0..13).collect();
        let frames = encode_chunks(can_id::REQUEST, TESTER_ADDRESS, &message);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data, vec![0xC2, 0xA1, 0, 1, 2, 3, 4, 5]);
        assert_eq!(frames[1].data, vec![0x81, 0xA1, 6, 7, 8, 9, 10, 11]);
        assert_eq!(frames[2].data, vec![0x00, 0xA1, 12, 0, 0, 0, 0, 0]);
        assert_eq!(frames[0].kind, FrameKind::ResponseRequired);
        assert_eq!(frames[1].kind, FrameKind::ResponseRequired);
        assert_eq!(frames[2].kind, FrameKind::Outgoing);
    }

    #[test]
    fn single_chunk_is_first_and_last() {
        let frames = encode_chunks(can_id::REQUEST, TESTER_ADDRESS, &[0x02, 0x21, 0xF0]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data[0], FIRST_CHUNK);
        assert_eq!(frames[0].kind, FrameKind::Outgoing);
    }

    #[test]
    fn reader_round_trips_encoder_output() {
        for len in [1usize, 6, 7, 12, 13, 37] {
            let message = message_of(len);
            let frames = ecu_frames(&message);

            let mut reader = ChunkReader::new(&frames[0]).unwrap();
            for frame in &frames[1..] {
                reader.push(frame).unwrap();
            }
            assert!(reader.is_complete(), "len {}", len);
            assert_eq!(reader.into_message().unwrap(), message, "len {}", len);
        }
    }

    #[test]
    fn counter_must_descend() {
        let frames = ecu_frames(&message_of(19));
        let mut reader = ChunkReader::new(&frames[0]).unwrap();
        let err = reader.push(&frames[2]).unwrap_err();
        assert!(matches!(err, KwpError::ProtocolViolation(_)));
    }

    #[test]
    fn first_frame_flag_required() {
        let frames = ecu_frames(&message_of(13));
        assert!(matches!(
            ChunkReader::new(&frames[1]),
            Err(KwpError::ProtocolViolation(_))
        ));

        let mut reader = ChunkReader::new(&frames[0]).unwrap();
        assert!(reader.push(&frames[0]).is_err());
    }

    #[test]
    fn counter_and_length_must_agree() {
        // declares 9 more bytes (two frames) but claims no continuation
        let frame = CanFrame::outgoing(
            can_id::RESPONSE,
            vec![0xC0, ECU_ADDRESS, 0x09, 0x61, 0xF0, 1, 2, 3],
        );
        assert!(matches!(
            ChunkReader::new(&frame),
            Err(KwpError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn short_frame_is_rejected() {
        let first = CanFrame::outgoing(
            can_id::RESPONSE,
            vec![0xC1, ECU_ADDRESS, 0x08, 0x61, 0xF0, 1, 2, 3],
        );
        let mut reader = ChunkReader::new(&first).unwrap();
        let short = CanFrame::outgoing(can_id::RESPONSE, vec![0x80, ECU_ADDRESS, 4]);
        assert!(matches!(
            reader.push(&short),
            Err(KwpError::ProtocolViolation(_))
        ));
        assert_eq!(reader.remaining(), 3);
    }

    #[test]
    fn acknowledgement_clears_first_flag() {
        let ack = acknowledgement(0xC3);
        assert_eq!(ack.id, can_id::TESTER_ACK);
        assert_eq!(ack.data, vec![0x40, 0xA1, 0x3F, 0x83, 0, 0, 0, 0]);
    }
}
