//! MFRC522 driver state machine.
//!
//! The driver speaks the register protocol of the MFRC522 over an
//! [`SpiBus`] and implements the ISO 14443-A card commands on top of it:
//!
//! ```text
//! Idle → Requesting → (NoCard | Colliding) → Anticollision → Selected
//!      → Authenticating → (Authenticated | AuthFailed) → [Reading | Writing] → Idle
//! ```
//!
//! Low-level operations return a [`Status`] instead of a `Result`: most
//! unsuccessful exchanges (no card in the field, failed authentication, CRC
//! errors) are ordinary outcomes of radio traffic. Only
//! [`read_card`](Mfrc522::read_card) and the lifecycle calls return
//! `Result`, and only for hardware faults.
//!
//! Every exchange polls the interrupt register a bounded number of times
//! ([`MAX_IRQ_POLLS`], [`MAX_CRC_POLLS`]) so a dead chip surfaces as
//! [`Fault::Timeout`] rather than a hang.

use crate::bus::SpiBus;
use crate::crc;
use crate::error::{BusError, Fault, ReaderError, Result};
use crate::frame::{self, BLOCK_SIZE, Frame, KEY_SIZE, NVB_ANTICOLL, NVB_SELECT};
use crate::registers::*;
use roomwatch_core::CardUid;
use roomwatch_core::constants::CARD_UID_LENGTH;
use tracing::{debug, trace, warn};

/// Iteration ceiling while waiting for a command to complete.
pub const MAX_IRQ_POLLS: u32 = 2000;

/// Iteration ceiling while waiting for the CRC coprocessor.
pub const MAX_CRC_POLLS: u32 = 255;

/// FIFO buffer size of the MFRC522.
const FIFO_SIZE: usize = 64;

/// Reply length of an ATQA in bits.
const ATQA_BITS: usize = 16;

/// Reply length of a SAK (1 byte + CRC_A) in bits.
const SAK_BITS: usize = 24;

/// Reply length of a READ (16 data bytes + CRC_A).
const READ_REPLY_LEN: usize = BLOCK_SIZE + 2;

/// Chip versions reported by genuine and common clone MFRC522 parts.
const KNOWN_VERSIONS: [u8; 4] = [0x88, 0x90, 0x91, 0x92];

/// Outcome of a low-level reader operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status<T> {
    Ok(T),
    /// No card answered.
    NoTag,
    Error(Fault),
}

impl<T> Status<T> {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok(_))
    }

    /// The success value, discarding the failure reason.
    pub fn ok(self) -> Option<T> {
        match self {
            Status::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Status<U> {
        match self {
            Status::Ok(value) => Status::Ok(f(value)),
            Status::NoTag => Status::NoTag,
            Status::Error(fault) => Status::Error(fault),
        }
    }

    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Status::Error(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Unwrap a `Status::Ok` or return the other variants from a function
/// returning `std::result::Result<Status<_>, BusError>`.
macro_rules! try_status {
    ($status:expr) => {
        match $status {
            Status::Ok(value) => value,
            Status::NoTag => return Ok(Status::NoTag),
            Status::Error(fault) => return Ok(Status::Error(fault)),
        }
    };
}

fn flatten<T>(result: std::result::Result<Status<T>, BusError>) -> Status<T> {
    result.unwrap_or_else(|err| Status::Error(Fault::Bus(err)))
}

/// Driver states, tracked per [`ReaderSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    #[default]
    Idle,
    Requesting,
    NoCard,
    Colliding,
    Anticollision,
    Selected,
    Authenticating,
    Authenticated,
    AuthFailed,
    Reading,
    Writing,
}

/// Transient state of one card poll.
///
/// Created at the start of a poll and discarded at the end; nothing carries
/// over between polls.
#[derive(Debug, Clone, Default)]
pub struct ReaderSession {
    state: ReaderState,
    last_command: Option<PiccCommand>,
    last_fault: Option<Fault>,
    trail: Vec<ReaderState>,
}

impl ReaderSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    #[must_use]
    pub fn last_command(&self) -> Option<PiccCommand> {
        self.last_command
    }

    #[must_use]
    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    /// Every state entered, in order, excluding the initial `Idle`.
    #[must_use]
    pub fn trail(&self) -> &[ReaderState] {
        &self.trail
    }

    fn enter(&mut self, state: ReaderState) {
        self.state = state;
        self.trail.push(state);
    }

    fn issue(&mut self, state: ReaderState, command: PiccCommand) {
        self.last_command = Some(command);
        self.enter(state);
    }

    fn fail(&mut self, state: ReaderState, fault: Fault) {
        self.last_fault = Some(fault);
        self.enter(state);
    }
}

/// Reply collected from the FIFO after a Transceive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub data: Vec<u8>,
    /// Number of valid bits received.
    pub bits: usize,
}

/// MFRC522 driver owning its bus handle.
#[derive(Debug)]
pub struct Mfrc522<B> {
    bus: B,
}

impl<B: SpiBus> Mfrc522<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Give the bus handle back.
    pub fn into_inner(self) -> B {
        self.bus
    }

    // ------------------------------------------------------------------
    // Register access
    // ------------------------------------------------------------------

    /// Write one register.
    ///
    /// # Errors
    /// Returns [`BusError`] if the SPI transfer fails.
    pub fn write_register(&mut self, reg: Register, value: u8) -> std::result::Result<(), BusError> {
        let mut buf = frame::register_write(reg, value);
        trace!(?reg, value = format_args!("{value:#04x}"), "write");
        self.bus.transfer(&mut buf)
    }

    /// Read one register.
    ///
    /// # Errors
    /// Returns [`BusError`] if the SPI transfer fails.
    pub fn read_register(&mut self, reg: Register) -> std::result::Result<u8, BusError> {
        let mut buf = frame::register_read(reg);
        self.bus.transfer(&mut buf)?;
        trace!(?reg, value = format_args!("{:#04x}", buf[1]), "read");
        Ok(buf[1])
    }

    fn set_bits(&mut self, reg: Register, mask: u8) -> std::result::Result<(), BusError> {
        let current = self.read_register(reg)?;
        self.write_register(reg, current | mask)
    }

    fn clear_bits(&mut self, reg: Register, mask: u8) -> std::result::Result<(), BusError> {
        let current = self.read_register(reg)?;
        self.write_register(reg, current & !mask)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Soft-reset the chip.
    ///
    /// # Errors
    /// Returns [`ReaderError::Bus`] on transfer failure.
    pub fn reset(&mut self) -> Result<()> {
        self.write_register(Register::Command, PcdCommand::SoftReset.code())?;
        Ok(())
    }

    /// Reset and configure the chip: 25 ms receive timeout, 100% ASK,
    /// CRC preset 0x6363, antenna on.
    ///
    /// # Errors
    /// Returns [`ReaderError::Bus`] on transfer failure.
    pub fn init(&mut self) -> Result<()> {
        self.reset()?;
        self.write_register(Register::TMode, 0x8D)?;
        self.write_register(Register::TPrescaler, 0x3E)?;
        self.write_register(Register::TReloadL, 30)?;
        self.write_register(Register::TReloadH, 0)?;
        self.write_register(Register::TxAuto, 0x40)?;
        self.write_register(Register::Mode, 0x3D)?;
        self.antenna_on()?;
        debug!("MFRC522 initialized");
        Ok(())
    }

    /// Enable the antenna drivers if they are off.
    ///
    /// # Errors
    /// Returns [`ReaderError::Bus`] on transfer failure.
    pub fn antenna_on(&mut self) -> Result<()> {
        let current = self.read_register(Register::TxControl)?;
        if current & TX_CONTROL_ANTENNA != TX_CONTROL_ANTENNA {
            self.write_register(Register::TxControl, current | TX_CONTROL_ANTENNA)?;
        }
        Ok(())
    }

    /// Disable the antenna drivers.
    ///
    /// # Errors
    /// Returns [`ReaderError::Bus`] on transfer failure.
    pub fn antenna_off(&mut self) -> Result<()> {
        self.clear_bits(Register::TxControl, TX_CONTROL_ANTENNA)?;
        Ok(())
    }

    /// Contents of `VersionReg`.
    ///
    /// # Errors
    /// Returns [`ReaderError::Bus`] on transfer failure.
    pub fn version(&mut self) -> Result<u8> {
        Ok(self.read_register(Register::Version)?)
    }

    /// Check that a known chip answers and that its CRC coprocessor agrees
    /// with [`crc::compute`]. Returns the chip version.
    ///
    /// # Errors
    /// Returns [`ReaderError::UnexpectedVersion`] when the version register
    /// does not identify an MFRC522, [`ReaderError::SelfTest`] when the
    /// coprocessor disagrees, and bus or timeout errors otherwise.
    pub fn self_test(&mut self) -> Result<u8> {
        let version = self.version()?;
        if !KNOWN_VERSIONS.contains(&version) {
            return Err(ReaderError::UnexpectedVersion(version));
        }

        let probe = [PiccCommand::Halt.code(), 0x00];
        match self.calculate_crc(&probe) {
            Status::Ok(hw) if hw == crc::compute(&probe) => {
                debug!(version = format_args!("{version:#04x}"), "Card reader self-test passed");
                Ok(version)
            }
            Status::Ok(hw) => Err(ReaderError::SelfTest(format!(
                "CRC coprocessor returned {:02X}{:02X}",
                hw[0], hw[1]
            ))),
            Status::NoTag => Err(ReaderError::SelfTest("CRC coprocessor idle".to_string())),
            Status::Error(fault) => Err(ReaderError::from_fault(&fault)
                .unwrap_or_else(|| ReaderError::SelfTest(fault.to_string()))),
        }
    }

    // ------------------------------------------------------------------
    // Chip commands
    // ------------------------------------------------------------------

    /// Run `data` through the CRC coprocessor.
    pub fn calculate_crc(&mut self, data: &[u8]) -> Status<[u8; 2]> {
        flatten(self.try_calculate_crc(data))
    }

    fn try_calculate_crc(&mut self, data: &[u8]) -> std::result::Result<Status<[u8; 2]>, BusError> {
        self.write_register(Register::Command, PcdCommand::Idle.code())?;
        self.write_register(Register::DivIrq, DIV_IRQ_CRC)?;
        self.write_register(Register::FifoLevel, FIFO_FLUSH)?;
        for &byte in data {
            self.write_register(Register::FifoData, byte)?;
        }
        self.write_register(Register::Command, PcdCommand::CalcCrc.code())?;

        let mut done = false;
        for _ in 0..MAX_CRC_POLLS {
            if self.read_register(Register::DivIrq)? & DIV_IRQ_CRC != 0 {
                done = true;
                break;
            }
        }
        self.write_register(Register::Command, PcdCommand::Idle.code())?;
        if !done {
            return Ok(Status::Error(Fault::Timeout));
        }

        let low = self.read_register(Register::CrcResultL)?;
        let high = self.read_register(Register::CrcResultH)?;
        Ok(Status::Ok([low, high]))
    }

    /// Send `data` to the card and collect the reply.
    pub fn transceive(&mut self, data: &[u8]) -> Status<Response> {
        flatten(self.to_card(PcdCommand::Transceive, data))
    }

    fn to_card(
        &mut self,
        command: PcdCommand,
        data: &[u8],
    ) -> std::result::Result<Status<Response>, BusError> {
        let (irq_en, wait_irq) = match command {
            PcdCommand::MfAuthent => (0x12, COMM_IRQ_IDLE),
            PcdCommand::Transceive => (0x77, COMM_IRQ_IDLE | COMM_IRQ_RX),
            _ => (0x00, 0x00),
        };

        self.write_register(Register::CommIEn, irq_en | 0x80)?;
        // Set1 cleared: every bit written as 1 is cleared.
        self.write_register(Register::CommIrq, !COMM_IRQ_SET1)?;
        self.set_bits(Register::FifoLevel, FIFO_FLUSH)?;
        self.write_register(Register::Command, PcdCommand::Idle.code())?;

        for &byte in data {
            self.write_register(Register::FifoData, byte)?;
        }
        self.write_register(Register::Command, command.code())?;
        if command == PcdCommand::Transceive {
            self.set_bits(Register::BitFraming, BIT_FRAMING_START_SEND)?;
        }

        let mut irq = None;
        for _ in 0..MAX_IRQ_POLLS {
            let n = self.read_register(Register::CommIrq)?;
            if n & COMM_IRQ_TIMER != 0 || n & wait_irq != 0 {
                irq = Some(n);
                break;
            }
        }
        self.clear_bits(Register::BitFraming, BIT_FRAMING_START_SEND)?;

        let Some(n) = irq else {
            warn!(?command, polls = MAX_IRQ_POLLS, "Card reader did not raise an interrupt");
            return Ok(Status::Error(Fault::Timeout));
        };

        let errors = self.read_register(Register::Error)? & ERROR_MASK;
        if errors != 0 {
            return Ok(Status::Error(Fault::Protocol(errors)));
        }
        if n & irq_en & COMM_IRQ_TIMER != 0 {
            return Ok(Status::NoTag);
        }
        if command != PcdCommand::Transceive {
            return Ok(Status::Ok(Response::default()));
        }

        let level = usize::from(self.read_register(Register::FifoLevel)?);
        let last_bits = usize::from(self.read_register(Register::Control)? & CONTROL_RX_LAST_BITS);
        let bits = match (level, last_bits) {
            (0, _) => 0,
            (n, 0) => n * 8,
            (n, last) => (n - 1) * 8 + last,
        };

        let mut reply = Vec::with_capacity(level.min(FIFO_SIZE));
        for _ in 0..level.min(FIFO_SIZE) {
            reply.push(self.read_register(Register::FifoData)?);
        }
        Ok(Status::Ok(Response { data: reply, bits }))
    }

    /// Send a whole-byte frame.
    fn send_frame(
        &mut self,
        command: PcdCommand,
        frame: &Frame,
    ) -> std::result::Result<Status<Response>, BusError> {
        self.write_register(Register::BitFraming, 0x00)?;
        self.to_card(command, frame.as_bytes())
    }

    // ------------------------------------------------------------------
    // Card commands
    // ------------------------------------------------------------------

    /// Send REQA/WUPA as a short frame and return the ATQA.
    ///
    /// Anything but a 16-bit reply is `NoTag`; only bus faults and the
    /// iteration ceiling are reported as `Error`.
    pub fn request(&mut self, mode: RequestMode) -> Status<u16> {
        flatten(self.try_request(mode))
    }

    fn try_request(&mut self, mode: RequestMode) -> std::result::Result<Status<u16>, BusError> {
        self.write_register(Register::BitFraming, 0x07)?;
        let status = self.to_card(PcdCommand::Transceive, &[mode.command().code()])?;
        Ok(match status {
            Status::Ok(reply) if reply.bits == ATQA_BITS && reply.data.len() == 2 => {
                Status::Ok(u16::from_le_bytes([reply.data[0], reply.data[1]]))
            }
            Status::Error(fault) if fault.is_hardware() => Status::Error(fault),
            _ => Status::NoTag,
        })
    }

    /// Cascade-level-1 anti-collision.
    ///
    /// The UID is accepted only when exactly five bytes arrive and the BCC
    /// matches; a BCC mismatch is treated as noise and reported as `NoTag`.
    pub fn anticollision(&mut self) -> Status<CardUid> {
        flatten(self.try_anticollision())
    }

    fn try_anticollision(&mut self) -> std::result::Result<Status<CardUid>, BusError> {
        self.write_register(Register::BitFraming, 0x00)?;
        let reply = try_status!(self.to_card(
            PcdCommand::Transceive,
            &[PiccCommand::AntiColl.code(), NVB_ANTICOLL]
        )?);

        let Ok(uid) = CardUid::try_from(reply.data.as_slice()) else {
            return Ok(Status::Error(Fault::BadLength {
                expected: CARD_UID_LENGTH,
                actual: reply.data.len(),
            }));
        };
        if !uid.has_valid_bcc() {
            debug!(uid = %uid, "Discarding UID with BCC mismatch");
            return Ok(Status::NoTag);
        }
        Ok(Status::Ok(uid))
    }

    /// SELECT the card and return its SAK, or `0` on any failure.
    pub fn select(&mut self, uid: &CardUid) -> u8 {
        match self.try_select(uid) {
            Ok(Status::Ok(sak)) => sak,
            Ok(_) => 0,
            Err(err) => {
                warn!(error = %err, "SELECT failed on the bus");
                0
            }
        }
    }

    fn try_select(&mut self, uid: &CardUid) -> std::result::Result<Status<u8>, BusError> {
        let mut payload = [0u8; 1 + CARD_UID_LENGTH];
        payload[0] = NVB_SELECT;
        payload[1..].copy_from_slice(uid.as_bytes());
        let Ok(frame) = frame::build_frame(PiccCommand::AntiColl, &payload) else {
            return Ok(Status::Error(Fault::BadLength {
                expected: payload.len(),
                actual: payload.len(),
            }));
        };

        let reply = try_status!(self.send_frame(PcdCommand::Transceive, &frame)?);
        if reply.bits != SAK_BITS {
            return Ok(Status::Error(Fault::BadLength {
                expected: SAK_BITS,
                actual: reply.bits,
            }));
        }
        Ok(Status::Ok(reply.data[0]))
    }

    /// MFAuthent against `block` with a sector key.
    ///
    /// `AuthFailed` is an expected outcome for cards provisioned with a
    /// different key.
    pub fn authenticate(
        &mut self,
        mode: AuthMode,
        block: u8,
        key: &[u8; KEY_SIZE],
        uid: &CardUid,
    ) -> Status<()> {
        flatten(self.try_authenticate(mode, block, key, uid))
    }

    fn try_authenticate(
        &mut self,
        mode: AuthMode,
        block: u8,
        key: &[u8; KEY_SIZE],
        uid: &CardUid,
    ) -> std::result::Result<Status<()>, BusError> {
        let mut payload = Vec::with_capacity(1 + KEY_SIZE + 4);
        payload.push(block);
        payload.extend_from_slice(key);
        payload.extend_from_slice(uid.serial());
        let Ok(frame) = frame::build_frame(mode.command(), &payload) else {
            return Ok(Status::Error(Fault::BadLength {
                expected: 1 + KEY_SIZE + 4,
                actual: payload.len(),
            }));
        };

        try_status!(self.send_frame(PcdCommand::MfAuthent, &frame)?);
        if self.read_register(Register::Status2)? & STATUS2_CRYPTO1_ON == 0 {
            return Ok(Status::Error(Fault::AuthFailed));
        }
        Ok(Status::Ok(()))
    }

    /// Leave the authenticated state.
    ///
    /// # Errors
    /// Returns [`ReaderError::Bus`] on transfer failure.
    pub fn stop_crypto(&mut self) -> Result<()> {
        self.clear_bits(Register::Status2, STATUS2_CRYPTO1_ON)?;
        Ok(())
    }

    /// Read a 16-byte block. The reply CRC is verified.
    pub fn read_block(&mut self, addr: u8) -> Status<[u8; BLOCK_SIZE]> {
        flatten(self.try_read_block(addr))
    }

    fn try_read_block(&mut self, addr: u8) -> std::result::Result<Status<[u8; BLOCK_SIZE]>, BusError> {
        let Ok(frame) = frame::build_frame(PiccCommand::Read, &[addr]) else {
            return Ok(Status::Error(Fault::BadLength { expected: 1, actual: 1 }));
        };
        let reply = try_status!(self.send_frame(PcdCommand::Transceive, &frame)?);

        if reply.bits == 4 {
            return Ok(Status::Error(Fault::Nack(nibble(&reply))));
        }
        if reply.data.len() != READ_REPLY_LEN {
            return Ok(Status::Error(Fault::BadLength {
                expected: READ_REPLY_LEN,
                actual: reply.data.len(),
            }));
        }
        if !crc::verify(&reply.data) {
            return Ok(Status::Error(Fault::Crc));
        }

        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&reply.data[..BLOCK_SIZE]);
        Ok(Status::Ok(block))
    }

    /// Write a 16-byte block in two acknowledged phases.
    pub fn write_block(&mut self, addr: u8, data: &[u8; BLOCK_SIZE]) -> Status<()> {
        flatten(self.try_write_block(addr, data))
    }

    fn try_write_block(
        &mut self,
        addr: u8,
        data: &[u8; BLOCK_SIZE],
    ) -> std::result::Result<Status<()>, BusError> {
        let (Ok(command), Ok(payload)) = (
            frame::build_frame(PiccCommand::Write, &[addr]),
            frame::build_data_frame(data),
        ) else {
            return Ok(Status::Error(Fault::BadLength {
                expected: BLOCK_SIZE,
                actual: data.len(),
            }));
        };

        for phase in [&command, &payload] {
            let reply = try_status!(self.send_frame(PcdCommand::Transceive, phase)?);
            let code = nibble(&reply);
            if reply.bits != 4 || code != MIFARE_ACK {
                return Ok(Status::Error(Fault::Nack(code)));
            }
        }
        Ok(Status::Ok(()))
    }

    /// Put the card into HALT. A halted card does not answer, so silence
    /// counts as success.
    pub fn halt(&mut self) -> Status<()> {
        let Ok(frame) = frame::build_frame(PiccCommand::Halt, &[0x00]) else {
            return Status::Ok(());
        };
        match flatten(self.send_frame(PcdCommand::Transceive, &frame)) {
            Status::Error(fault) if fault.is_hardware() => Status::Error(fault),
            _ => Status::Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Polls
    // ------------------------------------------------------------------

    /// Poll for a card: REQA followed by anti-collision.
    ///
    /// Returns `Ok(None)` when no card, or no valid card, is in the field.
    ///
    /// # Errors
    /// Returns [`ReaderError`] only for hardware faults: a failed bus
    /// transfer or an exchange that hit the poll ceiling.
    pub fn read_card(&mut self) -> Result<Option<CardUid>> {
        let mut session = ReaderSession::new();
        let result = self.read_card_with(&mut session);
        trace!(trail = ?session.trail(), "Card poll finished");
        result
    }

    /// [`read_card`](Self::read_card) recording transitions into `session`.
    ///
    /// # Errors
    /// Same as [`read_card`](Self::read_card).
    pub fn read_card_with(&mut self, session: &mut ReaderSession) -> Result<Option<CardUid>> {
        session.issue(ReaderState::Requesting, RequestMode::Idle.command());
        match self.request(RequestMode::Idle) {
            Status::Ok(_) => {}
            Status::NoTag => {
                session.enter(ReaderState::NoCard);
                session.enter(ReaderState::Idle);
                return Ok(None);
            }
            Status::Error(fault) => return finish_with_fault(session, ReaderState::Idle, fault),
        }

        session.issue(ReaderState::Anticollision, PiccCommand::AntiColl);
        let outcome = match self.anticollision() {
            Status::Ok(uid) => Ok(Some(uid)),
            Status::NoTag => {
                session.enter(ReaderState::NoCard);
                Ok(None)
            }
            Status::Error(Fault::Protocol(bits)) => {
                session.fail(ReaderState::Colliding, Fault::Protocol(bits));
                Ok(None)
            }
            Status::Error(fault) => return finish_with_fault(session, ReaderState::Idle, fault),
        };
        session.enter(ReaderState::Idle);
        outcome
    }

    /// Select, authenticate and read one block of the card in the field.
    ///
    /// Returns `Ok(None)` if the card disappeared or refused the key.
    ///
    /// # Errors
    /// Returns [`ReaderError`] for hardware faults.
    pub fn read_authenticated_block(
        &mut self,
        uid: &CardUid,
        block: u8,
        key: &[u8; KEY_SIZE],
        session: &mut ReaderSession,
    ) -> Result<Option<[u8; BLOCK_SIZE]>> {
        let sak = self.select(uid);
        if sak == 0 {
            session.last_command = Some(PiccCommand::AntiColl);
            session.enter(ReaderState::NoCard);
            session.enter(ReaderState::Idle);
            return Ok(None);
        }
        session.issue(ReaderState::Selected, PiccCommand::AntiColl);

        session.issue(ReaderState::Authenticating, AuthMode::KeyA.command());
        match self.authenticate(AuthMode::KeyA, block, key, uid) {
            Status::Ok(()) => session.enter(ReaderState::Authenticated),
            Status::NoTag => {
                session.enter(ReaderState::NoCard);
                session.enter(ReaderState::Idle);
                return Ok(None);
            }
            Status::Error(fault) if fault.is_hardware() => {
                return finish_with_fault(session, ReaderState::Idle, fault);
            }
            Status::Error(fault) => {
                debug!(uid = %uid, block, "Sector authentication refused");
                session.fail(ReaderState::AuthFailed, fault);
                session.enter(ReaderState::Idle);
                return Ok(None);
            }
        }

        session.issue(ReaderState::Reading, PiccCommand::Read);
        let status = self.read_block(block);
        self.stop_crypto()?;
        session.enter(ReaderState::Idle);
        match status {
            Status::Ok(data) => Ok(Some(data)),
            Status::NoTag => Ok(None),
            Status::Error(fault) => match ReaderError::from_fault(&fault) {
                Some(err) => Err(err),
                None => {
                    session.last_fault = Some(fault);
                    Ok(None)
                }
            },
        }
    }
}

fn nibble(reply: &Response) -> u8 {
    reply.data.first().map_or(0, |b| b & 0x0F)
}

fn finish_with_fault<T>(session: &mut ReaderSession, state: ReaderState, fault: Fault) -> Result<Option<T>> {
    let error = ReaderError::from_fault(&fault);
    session.fail(state, fault);
    match error {
        Some(err) => Err(err),
        None => Ok(None),
    }
}
