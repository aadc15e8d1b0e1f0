//! Simulated MFRC522 for testing and development.
//!
//! [`SimulatedMfrc522`] is an `embedded-hal` [`SpiDevice`], so it plugs into
//! the driver like a spidev node does. It emulates the chip's
//! register file, FIFO and command set (Transceive, MFAuthent, CalcCRC,
//! SoftReset) against a virtual MIFARE Classic 1K card. The card in the
//! field is controlled through a [`SimulatedFieldHandle`], which can be
//! cloned and moved to another thread while the driver owns the bus.
//!
//! # Examples
//!
//! ```
//! use roomwatch_core::CardUid;
//! use roomwatch_rfid::{Mfrc522, mock::SimulatedMfrc522};
//!
//! let (chip, field) = SimulatedMfrc522::new();
//! let mut reader = Mfrc522::new(chip);
//! reader.init().unwrap();
//!
//! assert_eq!(reader.read_card().unwrap(), None);
//!
//! let uid = CardUid::from_serial([5, 74, 28, 185]);
//! field.present_card(uid);
//! assert_eq!(reader.read_card().unwrap(), Some(uid));
//! ```

use crate::crc;
use crate::error::BusError;
use crate::frame::{BLOCK_SIZE, KEY_SIZE, NVB_ANTICOLL, NVB_SELECT};
use crate::registers::*;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};
use parking_lot::Mutex;
use roomwatch_core::CardUid;
use roomwatch_core::constants::DEFAULT_SECTOR_KEY;
use std::collections::VecDeque;
use std::sync::Arc;

/// Version reported by the simulated chip (MFRC522 v2.0).
pub const SIMULATED_VERSION: u8 = 0x92;

const REGISTER_COUNT: usize = 64;
const FIFO_SIZE: usize = 64;
const BLOCK_COUNT: usize = 64;
const BLOCKS_PER_SECTOR: u8 = 4;

/// SAK of a MIFARE Classic 1K.
const SAK_MIFARE_1K: u8 = 0x08;

/// ATQA of a MIFARE Classic 1K, low byte first.
const ATQA_MIFARE_1K: [u8; 2] = [0x04, 0x00];

const NACK_NOT_ALLOWED: u8 = 0x04;
const NACK_TRANSMISSION: u8 = 0x05;

/// Virtual MIFARE Classic 1K card.
#[derive(Debug, Clone)]
struct VirtualCard {
    uid: CardUid,
    key_a: [u8; KEY_SIZE],
    blocks: Vec<[u8; BLOCK_SIZE]>,
    halted: bool,
    authenticated_sector: Option<u8>,
    pending_write: Option<u8>,
}

impl VirtualCard {
    fn new(uid: CardUid, key_a: [u8; KEY_SIZE]) -> Self {
        let mut blocks = vec![[0u8; BLOCK_SIZE]; BLOCK_COUNT];
        blocks[0][..5].copy_from_slice(uid.as_bytes());
        blocks[0][5] = SAK_MIFARE_1K;
        for trailer in (3..BLOCK_COUNT).step_by(BLOCKS_PER_SECTOR as usize) {
            blocks[trailer][..KEY_SIZE].copy_from_slice(&key_a);
            blocks[trailer][6..10].copy_from_slice(&[0xFF, 0x07, 0x80, 0x69]);
            blocks[trailer][10..].copy_from_slice(&DEFAULT_SECTOR_KEY);
        }
        Self {
            uid,
            key_a,
            blocks,
            halted: false,
            authenticated_sector: None,
            pending_write: None,
        }
    }

    fn can_access(&self, block: u8) -> bool {
        usize::from(block) < BLOCK_COUNT
            && self.authenticated_sector == Some(block / BLOCKS_PER_SECTOR)
    }
}

/// Reply to a frame: data bytes and the number of valid bits in the last byte
/// (0 means the whole byte).
type Reply = (Vec<u8>, u8);

#[derive(Debug)]
struct ChipState {
    regs: [u8; REGISTER_COUNT],
    fifo: VecDeque<u8>,
    card: Option<VirtualCard>,
    corrupt_bcc: bool,
    responsive: bool,
    bus_failures: u32,
    transfers: u64,
}

impl ChipState {
    fn new() -> Self {
        let mut state = Self {
            regs: [0; REGISTER_COUNT],
            fifo: VecDeque::with_capacity(FIFO_SIZE),
            card: None,
            corrupt_bcc: false,
            responsive: true,
            bus_failures: 0,
            transfers: 0,
        };
        state.soft_reset();
        state
    }

    fn soft_reset(&mut self) {
        self.regs = [0; REGISTER_COUNT];
        self.regs[Register::Version.addr() as usize] = SIMULATED_VERSION;
        self.regs[Register::TxControl.addr() as usize] = 0x80;
        self.regs[Register::Mode.addr() as usize] = 0x3F;
        self.fifo.clear();
        if let Some(card) = self.card.as_mut() {
            card.authenticated_sector = None;
            card.pending_write = None;
        }
    }

    fn reg(&self, reg: Register) -> u8 {
        self.regs[reg.addr() as usize]
    }

    fn reg_mut(&mut self, reg: Register) -> &mut u8 {
        &mut self.regs[reg.addr() as usize]
    }

    fn read(&mut self, addr: u8) -> u8 {
        if !self.responsive {
            return 0x00;
        }
        if addr == Register::FifoData.addr() {
            return self.fifo.pop_front().unwrap_or(0);
        }
        if addr == Register::FifoLevel.addr() {
            return self.fifo.len() as u8;
        }
        self.regs[usize::from(addr) % REGISTER_COUNT]
    }

    fn write(&mut self, addr: u8, value: u8) {
        if !self.responsive {
            return;
        }
        match addr {
            a if a == Register::Command.addr() => self.execute(value),
            a if a == Register::FifoData.addr() => {
                if self.fifo.len() < FIFO_SIZE {
                    self.fifo.push_back(value);
                }
            }
            a if a == Register::FifoLevel.addr() => {
                if value & FIFO_FLUSH != 0 {
                    self.fifo.clear();
                }
            }
            a if a == Register::CommIrq.addr() || a == Register::DivIrq.addr() => {
                let current = &mut self.regs[usize::from(a)];
                if value & COMM_IRQ_SET1 != 0 {
                    *current |= value & !COMM_IRQ_SET1;
                } else {
                    *current &= !value;
                }
            }
            a if a == Register::Error.addr() || a == Register::Version.addr() => {}
            a if a == Register::Status2.addr() => {
                *self.reg_mut(Register::Status2) = value;
                if value & STATUS2_CRYPTO1_ON == 0
                    && let Some(card) = self.card.as_mut()
                {
                    card.authenticated_sector = None;
                }
            }
            a if a == Register::BitFraming.addr() => {
                *self.reg_mut(Register::BitFraming) = value;
                let command = PcdCommand::from_code(self.reg(Register::Command));
                if value & BIT_FRAMING_START_SEND != 0 && command == Some(PcdCommand::Transceive) {
                    self.transceive(value & 0x07);
                }
            }
            a => self.regs[usize::from(a) % REGISTER_COUNT] = value,
        }
    }

    fn execute(&mut self, value: u8) {
        *self.reg_mut(Register::Command) = value & 0x0F;
        match PcdCommand::from_code(value) {
            Some(PcdCommand::SoftReset) => self.soft_reset(),
            Some(PcdCommand::CalcCrc) => {
                let data: Vec<u8> = self.fifo.drain(..).collect();
                let [low, high] = crc::compute(&data);
                *self.reg_mut(Register::CrcResultL) = low;
                *self.reg_mut(Register::CrcResultH) = high;
                *self.reg_mut(Register::DivIrq) |= DIV_IRQ_CRC;
            }
            Some(PcdCommand::MfAuthent) => self.authenticate(),
            _ => {}
        }
    }

    fn authenticate(&mut self) {
        let frame: Vec<u8> = self.fifo.drain(..).collect();
        let status2 = self.reg(Register::Status2) & !STATUS2_CRYPTO1_ON;
        let mut authenticated = false;

        if let Some(card) = self.card.as_mut()
            && !card.halted
            && frame.len() == 2 + KEY_SIZE + 4
            && frame[0] == PiccCommand::Auth1A.code()
        {
            let block = frame[1];
            let key = &frame[2..2 + KEY_SIZE];
            let serial = &frame[2 + KEY_SIZE..];
            if usize::from(block) < BLOCK_COUNT && key == card.key_a && serial == card.uid.serial() {
                card.authenticated_sector = Some(block / BLOCKS_PER_SECTOR);
                authenticated = true;
            } else {
                card.authenticated_sector = None;
            }
        }

        *self.reg_mut(Register::Status2) = if authenticated {
            status2 | STATUS2_CRYPTO1_ON
        } else {
            status2
        };
        *self.reg_mut(Register::CommIrq) |= COMM_IRQ_IDLE;
    }

    fn transceive(&mut self, tx_last_bits: u8) {
        let frame: Vec<u8> = self.fifo.drain(..).collect();
        let reply = self.respond(&frame, tx_last_bits);
        *self.reg_mut(Register::Error) = 0;
        match reply {
            Some((data, rx_last_bits)) => {
                self.fifo.extend(data);
                let control = self.reg(Register::Control) & !CONTROL_RX_LAST_BITS;
                *self.reg_mut(Register::Control) = control | rx_last_bits;
                *self.reg_mut(Register::CommIrq) |= COMM_IRQ_TX | COMM_IRQ_RX | COMM_IRQ_IDLE;
            }
            None => {
                *self.reg_mut(Register::CommIrq) |= COMM_IRQ_TX | COMM_IRQ_TIMER;
            }
        }
    }

    fn respond(&mut self, frame: &[u8], tx_last_bits: u8) -> Option<Reply> {
        let corrupt_bcc = self.corrupt_bcc;
        let card = self.card.as_mut()?;

        if tx_last_bits == 7 {
            return match frame {
                [0x26] if !card.halted => Some((ATQA_MIFARE_1K.to_vec(), 0)),
                [0x52] => {
                    card.halted = false;
                    Some((ATQA_MIFARE_1K.to_vec(), 0))
                }
                _ => None,
            };
        }
        if card.halted {
            return None;
        }

        if let Some(block) = card.pending_write.take() {
            if frame.len() != BLOCK_SIZE + 2 || !crc::verify(frame) {
                return Some((vec![NACK_TRANSMISSION], 4));
            }
            card.blocks[usize::from(block)].copy_from_slice(&frame[..BLOCK_SIZE]);
            return Some((vec![MIFARE_ACK], 4));
        }

        match frame {
            [0x93, nvb] if *nvb == NVB_ANTICOLL => {
                let mut uid = *card.uid.as_bytes();
                if corrupt_bcc {
                    uid[4] ^= 0xFF;
                }
                Some((uid.to_vec(), 0))
            }
            [0x93, nvb, uid @ ..] if *nvb == NVB_SELECT && frame.len() == 9 && crc::verify(frame) => {
                if &uid[..5] != card.uid.as_bytes() {
                    return None;
                }
                Some((crc::append(&[SAK_MIFARE_1K]), 0))
            }
            [0x30, block, ..] if frame.len() == 4 && crc::verify(frame) => {
                if !card.can_access(*block) {
                    return Some((vec![NACK_NOT_ALLOWED], 4));
                }
                Some((crc::append(&card.blocks[usize::from(*block)]), 0))
            }
            [0xA0, block, ..] if frame.len() == 4 && crc::verify(frame) => {
                if !card.can_access(*block) {
                    return Some((vec![NACK_NOT_ALLOWED], 4));
                }
                card.pending_write = Some(*block);
                Some((vec![MIFARE_ACK], 4))
            }
            [0x50, 0x00, ..] if frame.len() == 4 && crc::verify(frame) => {
                card.halted = true;
                card.authenticated_sector = None;
                None
            }
            _ => None,
        }
    }
}

/// Simulated MFRC522 attached to an SPI bus.
#[derive(Debug)]
pub struct SimulatedMfrc522 {
    state: Arc<Mutex<ChipState>>,
}

impl SimulatedMfrc522 {
    /// Create a chip with an empty field and its control handle.
    pub fn new() -> (Self, SimulatedFieldHandle) {
        let state = Arc::new(Mutex::new(ChipState::new()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedFieldHandle { state },
        )
    }
}

impl SimulatedMfrc522 {
    /// One chip-select-framed exchange: address byte, then data bytes.
    fn exchange(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.transfers += 1;
        if state.bus_failures > 0 {
            state.bus_failures -= 1;
            return Err(BusError::transfer("injected transfer failure"));
        }

        let Some((&mut addr_byte, rest)) = buf.split_first_mut() else {
            return Ok(());
        };
        let addr = (addr_byte >> 1) & 0x3F;
        if addr_byte & 0x80 != 0 {
            for slot in rest.iter_mut() {
                *slot = state.read(addr);
            }
        } else {
            for &value in rest.iter() {
                state.write(addr, value);
            }
        }
        buf[0] = 0x00;
        Ok(())
    }
}

impl ErrorType for SimulatedMfrc522 {
    type Error = BusError;
}

impl SpiDevice for SimulatedMfrc522 {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BusError> {
        for operation in operations {
            match operation {
                Operation::TransferInPlace(buf) => self.exchange(buf)?,
                Operation::Transfer(read, write) => {
                    let mut buf = write.to_vec();
                    self.exchange(&mut buf)?;
                    for (slot, byte) in read.iter_mut().zip(buf) {
                        *slot = byte;
                    }
                }
                Operation::Write(words) => self.exchange(&mut words.to_vec())?,
                Operation::Read(words) => words.fill(0),
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

/// Control handle for the card field of a [`SimulatedMfrc522`].
#[derive(Debug, Clone)]
pub struct SimulatedFieldHandle {
    state: Arc<Mutex<ChipState>>,
}

impl SimulatedFieldHandle {
    /// Place a card with the factory default key in the field.
    pub fn present_card(&self, uid: CardUid) {
        self.present_card_with_key(uid, DEFAULT_SECTOR_KEY);
    }

    /// Place a card whose sectors are protected by `key_a`.
    pub fn present_card_with_key(&self, uid: CardUid, key_a: [u8; KEY_SIZE]) {
        self.state.lock().card = Some(VirtualCard::new(uid, key_a));
    }

    /// Take the card out of the field.
    pub fn remove_card(&self) {
        self.state.lock().card = None;
    }

    /// UID of the card in the field.
    pub fn current_card(&self) -> Option<CardUid> {
        self.state.lock().card.as_ref().map(|card| card.uid)
    }

    /// Flip the BCC byte of anti-collision replies.
    pub fn set_corrupt_bcc(&self, corrupt: bool) {
        self.state.lock().corrupt_bcc = corrupt;
    }

    /// Re-key every sector of the card in the field.
    pub fn set_sector_key(&self, key_a: [u8; KEY_SIZE]) {
        if let Some(card) = self.state.lock().card.as_mut() {
            card.key_a = key_a;
        }
    }

    /// When unresponsive, reads return zero and writes are ignored, as with a
    /// chip that lost power.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.state.lock().responsive = !unresponsive;
    }

    /// Fail the next `count` bus transfers.
    pub fn inject_bus_failures(&self, count: u32) {
        self.state.lock().bus_failures = count;
    }

    /// Data block of the card in the field.
    pub fn block(&self, block: u8) -> Option<[u8; BLOCK_SIZE]> {
        let state = self.state.lock();
        state
            .card
            .as_ref()
            .and_then(|card| card.blocks.get(usize::from(block)).copied())
    }

    /// Returns `true` if the card in the field has received HALT.
    pub fn is_halted(&self) -> bool {
        self.state.lock().card.as_ref().is_some_and(|card| card.halted)
    }

    /// Number of SPI transfers performed so far.
    pub fn transfer_count(&self) -> u64 {
        self.state.lock().transfers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthMode, Fault, Mfrc522, ReaderError, ReaderSession, ReaderState, RequestMode, Status};

    const CARD_A: CardUid = CardUid::new([5, 74, 28, 185, 234]);

    fn reader() -> (Mfrc522<SimulatedMfrc522>, SimulatedFieldHandle) {
        let (chip, field) = SimulatedMfrc522::new();
        let mut reader = Mfrc522::new(chip);
        reader.init().unwrap();
        (reader, field)
    }

    #[test]
    fn test_init_turns_antenna_on() {
        let (mut reader, _field) = reader();
        let tx = reader.read_register(Register::TxControl).unwrap();
        assert_eq!(tx & 0x03, 0x03);
        assert_eq!(reader.read_register(Register::Mode).unwrap(), 0x3D);
    }

    #[test]
    fn test_self_test_passes() {
        let (mut reader, _field) = reader();
        assert_eq!(reader.self_test().unwrap(), SIMULATED_VERSION);
    }

    #[test]
    fn test_calculate_crc_matches_software() {
        let (mut reader, _field) = reader();
        assert_eq!(
            reader.calculate_crc(&[0x30, 0x00]),
            Status::Ok(crc::compute(&[0x30, 0x00]))
        );
    }

    #[test]
    fn test_request_without_card_is_no_tag() {
        let (mut reader, _field) = reader();
        assert_eq!(reader.request(RequestMode::Idle), Status::NoTag);
    }

    #[test]
    fn test_request_returns_atqa() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        assert_eq!(reader.request(RequestMode::Idle), Status::Ok(0x0004));
    }

    #[test]
    fn test_read_card_session_trail() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);

        let mut session = ReaderSession::new();
        assert_eq!(reader.read_card_with(&mut session).unwrap(), Some(CARD_A));
        assert_eq!(
            session.trail(),
            &[
                ReaderState::Requesting,
                ReaderState::Anticollision,
                ReaderState::Idle
            ]
        );
        assert_eq!(session.last_fault(), None);
    }

    #[test]
    fn test_read_card_empty_field_trail() {
        let (mut reader, _field) = reader();
        let mut session = ReaderSession::new();
        assert_eq!(reader.read_card_with(&mut session).unwrap(), None);
        assert_eq!(
            session.trail(),
            &[ReaderState::Requesting, ReaderState::NoCard, ReaderState::Idle]
        );
    }

    #[test]
    fn test_bcc_mismatch_discarded() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        field.set_corrupt_bcc(true);

        assert_eq!(reader.anticollision(), Status::NoTag);
        assert_eq!(reader.read_card().unwrap(), None);
    }

    #[test]
    fn test_select_returns_sak() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        assert_eq!(reader.select(&CARD_A), 0x08);
        assert_eq!(reader.select(&CardUid::new([1, 2, 3, 4, 4])), 0);
    }

    #[test]
    fn test_authenticate_and_read_block() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);

        let mut session = ReaderSession::new();
        let block = reader
            .read_authenticated_block(&CARD_A, 0, &DEFAULT_SECTOR_KEY, &mut session)
            .unwrap()
            .unwrap();
        assert_eq!(&block[..5], CARD_A.as_bytes());
        assert_eq!(session.state(), ReaderState::Idle);
        assert!(session.trail().contains(&ReaderState::Authenticated));
        assert!(session.trail().contains(&ReaderState::Reading));
    }

    #[test]
    fn test_wrong_key_is_auth_failed() {
        let (mut reader, field) = reader();
        field.present_card_with_key(CARD_A, [0x11; KEY_SIZE]);

        assert_eq!(reader.select(&CARD_A), 0x08);
        assert_eq!(
            reader.authenticate(AuthMode::KeyA, 4, &DEFAULT_SECTOR_KEY, &CARD_A),
            Status::Error(Fault::AuthFailed)
        );

        let mut session = ReaderSession::new();
        let result = reader
            .read_authenticated_block(&CARD_A, 4, &DEFAULT_SECTOR_KEY, &mut session)
            .unwrap();
        assert_eq!(result, None);
        assert!(session.trail().contains(&ReaderState::AuthFailed));
        assert_eq!(session.last_fault(), Some(&Fault::AuthFailed));
    }

    #[test]
    fn test_read_without_auth_is_nack() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        reader.select(&CARD_A);
        assert_eq!(reader.read_block(4), Status::Error(Fault::Nack(NACK_NOT_ALLOWED)));
    }

    #[test]
    fn test_write_block_two_phases() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        reader.select(&CARD_A);
        assert!(
            reader
                .authenticate(AuthMode::KeyA, 5, &DEFAULT_SECTOR_KEY, &CARD_A)
                .is_ok()
        );

        let data = [0xAB; BLOCK_SIZE];
        assert_eq!(reader.write_block(5, &data), Status::Ok(()));
        assert_eq!(reader.read_block(5), Status::Ok(data));
        assert_eq!(field.block(5), Some(data));
        reader.stop_crypto().unwrap();
    }

    #[test]
    fn test_write_outside_sector_is_nack() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        reader.select(&CARD_A);
        assert!(
            reader
                .authenticate(AuthMode::KeyA, 5, &DEFAULT_SECTOR_KEY, &CARD_A)
                .is_ok()
        );
        assert_eq!(
            reader.write_block(9, &[0; BLOCK_SIZE]),
            Status::Error(Fault::Nack(NACK_NOT_ALLOWED))
        );
    }

    #[test]
    fn test_halt_silences_card_until_wakeup() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        reader.select(&CARD_A);

        assert_eq!(reader.halt(), Status::Ok(()));
        assert!(field.is_halted());
        assert_eq!(reader.request(RequestMode::Idle), Status::NoTag);
        assert!(reader.request(RequestMode::All).is_ok());
        assert!(!field.is_halted());
    }

    #[test]
    fn test_unresponsive_chip_times_out() {
        let (mut reader, field) = reader();
        field.set_unresponsive(true);
        assert_eq!(reader.request(RequestMode::Idle), Status::Error(Fault::Timeout));
        assert_eq!(reader.read_card(), Err(ReaderError::Timeout));
        assert!(matches!(
            reader.self_test(),
            Err(ReaderError::UnexpectedVersion(0x00))
        ));
    }

    #[test]
    fn test_bus_failure_surfaces_as_error() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        field.inject_bus_failures(1);

        assert!(matches!(reader.read_card(), Err(ReaderError::Bus(_))));
        assert_eq!(reader.read_card().unwrap(), Some(CARD_A));
    }

    #[test]
    fn test_no_state_between_polls() {
        let (mut reader, field) = reader();
        field.present_card(CARD_A);
        assert_eq!(reader.read_card().unwrap(), Some(CARD_A));
        field.remove_card();
        assert_eq!(reader.read_card().unwrap(), None);
        field.present_card(CARD_A);
        assert_eq!(reader.read_card().unwrap(), Some(CARD_A));
    }

    #[test]
    fn test_split_transfer_reads_register() {
        let (mut chip, _field) = SimulatedMfrc522::new();
        let write = crate::frame::register_read(Register::Version);
        let mut read = [0xFFu8; 2];

        SpiDevice::transfer(&mut chip, &mut read, &write).unwrap();
        assert_eq!(read, [0x00, SIMULATED_VERSION]);
    }

    #[test]
    fn test_injected_failure_reported_through_spi_device() {
        let (mut chip, field) = SimulatedMfrc522::new();
        field.inject_bus_failures(1);
        let mut buf = crate::frame::register_read(Register::Version);

        let err = chip.transfer_in_place(&mut buf).unwrap_err();
        assert_eq!(err, BusError::transfer("injected transfer failure"));
        assert_eq!(embedded_hal::spi::Error::kind(&err), embedded_hal::spi::ErrorKind::Other);
        assert_eq!(field.transfer_count(), 1);
    }
}
