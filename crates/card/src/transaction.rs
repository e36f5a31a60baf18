//! Secure-session transaction engine
//!
//! [`CardTransactionManager`] is the single coordinator of a transaction
//! context: it owns the transport, the crypto service, the session state and
//! the modifications-buffer tracker, and drives every command through the
//! synchronization hooks in strict order. One manager serves one card; it
//! must not be driven from more than one caller at a time, which the `&mut`
//! receivers enforce.
//!
//! Failure handling is coarse: any error raised while a session is open
//! collapses the session to closed. Challenges are single-use, so callers
//! recover by opening a fresh session.

use bytes::Bytes;
use calyx_apdu_core::{ApduRequest, ApduResponse, CardTransport};
use tracing::{debug, info, warn};

use crate::card::{CalypsoCard, SecuritySettings};
use crate::commands::{
    CardCommand, CloseSessionCmd, CommandRef, OpenSessionCmd, OpenSessionData, SvAction,
    SvDebitCmd, SvReloadCmd, SyncMode,
};
use crate::crypto::{CardCryptoService, CryptoError};
use crate::error::{Error, Result};
use crate::session::{sync, SessionBuffer, SessionState};

/// Transaction coordinator for one Calypso card
#[derive(Debug)]
pub struct CardTransactionManager<T, S> {
    transport: T,
    crypto: S,
    card: CalypsoCard,
    settings: SecuritySettings,
    state: SessionState,
    buffer: Option<SessionBuffer>,
    command_log: Vec<CommandRef>,
}

impl<T, S> CardTransactionManager<T, S>
where
    T: CardTransport,
    S: CardCryptoService,
{
    /// Bind a transport and a crypto service to a card
    pub const fn new(transport: T, crypto: S, card: CalypsoCard, settings: SecuritySettings) -> Self {
        Self {
            transport,
            crypto,
            card,
            settings,
            state: SessionState::Closed,
            buffer: None,
            command_log: Vec::new(),
        }
    }

    /// The card this manager operates on
    pub const fn card(&self) -> &CalypsoCard {
        &self.card
    }

    /// Current session state
    pub const fn session_state(&self) -> SessionState {
        self.state
    }

    /// The session buffer tracker, present while a session is open
    pub const fn session_buffer(&self) -> Option<&SessionBuffer> {
        self.buffer.as_ref()
    }

    /// Ordered log of the commands executed inside the current session
    ///
    /// Lives with the session: empty after close, abort, or any
    /// session-fatal error.
    pub fn session_command_log(&self) -> &[CommandRef] {
        &self.command_log
    }

    /// The transport, for inspection
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The crypto service, for inspection
    pub const fn crypto_service(&self) -> &S {
        &self.crypto
    }

    /// Open a secure session
    ///
    /// Fetches a challenge from the crypto service, transmits the open
    /// command (optionally reading `sfi`/`record_number` under the session
    /// opening) and seeds the MAC accumulator with the card's response.
    pub fn open_session(
        &mut self,
        key_index: u8,
        sfi: u8,
        record_number: u8,
    ) -> Result<OpenSessionData> {
        if self.state != SessionState::Closed {
            return Err(Error::InvalidState("a session is already open"));
        }

        let challenge = self
            .crypto
            .get_challenge(self.card.challenge_length())
            .map_err(Error::CryptoSynchronizationFailed)?;
        let mut cmd = OpenSessionCmd::new(&self.card, key_index, &challenge, sfi, record_number)?;

        let response = self.transmit_one(cmd.request())?;
        cmd.parse_response(&response)?;
        self.crypto
            .initialize_session(response.data())
            .map_err(Error::CryptoSynchronizationFailed)?;

        self.state = SessionState::Open;
        self.buffer = Some(SessionBuffer::new(self.card.modifications_buffer_size()));
        self.command_log.clear();
        info!(
            key_index,
            buffer_capacity = self.card.modifications_buffer_size(),
            "secure session opened"
        );

        cmd.session_data().cloned().ok_or(Error::InvalidResponse(
            CommandRef::OpenSession,
            "session data missing after parse",
        ))
    }

    /// Build and SAM-finalize an SV DEBIT or SV UNDEBIT command
    pub fn prepare_sv_debit(
        &mut self,
        action: SvAction,
        amount: i32,
        kvc: u8,
        date: &[u8],
        time: &[u8],
    ) -> Result<CardCommand> {
        let mut cmd = SvDebitCmd::new(&self.card, action, amount, kvc, date, time)?;
        let complementary = self
            .crypto
            .prepare_sv_operation(cmd.sv_operation_kind(), &cmd.sam_prepare_data())
            .map_err(Error::CryptoSynchronizationFailed)?;
        cmd.finalize(&complementary)?;
        Ok(CardCommand::SvDebit(cmd))
    }

    /// Build and SAM-finalize an SV RELOAD command
    pub fn prepare_sv_reload(
        &mut self,
        amount: i32,
        kvc: u8,
        date: &[u8],
        time: &[u8],
        free: &[u8],
    ) -> Result<CardCommand> {
        let mut cmd = SvReloadCmd::new(&self.card, amount, kvc, date, time, free)?;
        let complementary = self
            .crypto
            .prepare_sv_operation(cmd.sv_operation_kind(), &cmd.sam_prepare_data())
            .map_err(Error::CryptoSynchronizationFailed)?;
        cmd.finalize(&complementary)?;
        Ok(CardCommand::SvReload(cmd))
    }

    /// Execute a group of commands, inside or outside a session
    ///
    /// Inside a session, buffer capacity for the whole group is reserved
    /// before anything is transmitted, the accumulator is synchronized
    /// around every frame, and the group goes to the transport as one
    /// ordered batch (or as individual exchanges when encryption is
    /// active). Any failure aborts the session.
    pub fn process_commands(&mut self, commands: &mut [CardCommand]) -> Result<()> {
        let result = self.process_commands_inner(commands);
        if result.is_err() && self.state != SessionState::Closed {
            warn!("aborting secure session after command failure");
            self.state = SessionState::Closed;
            self.buffer = None;
            self.command_log.clear();
        }
        result
    }

    fn process_commands_inner(&mut self, commands: &mut [CardCommand]) -> Result<()> {
        match self.state {
            SessionState::AwaitingClose => {
                Err(Error::InvalidState("session close is in progress"))
            }
            SessionState::Closed => self.process_outside_session(commands),
            SessionState::Open => {
                let buffer = self
                    .buffer
                    .as_mut()
                    .ok_or(Error::InvalidState("open session without buffer tracker"))?;
                for command in commands.iter() {
                    buffer.reserve(command.session_buffer_cost())?;
                }
                if self.settings.is_encryption_required() {
                    self.process_encrypted(commands)
                } else {
                    self.process_batched(commands)
                }
            }
        }
    }

    /// Out-of-session execution: plain exchanges, no accumulator, no buffer
    fn process_outside_session(&mut self, commands: &mut [CardCommand]) -> Result<()> {
        for command in commands.iter_mut() {
            let frame = command.request()?.to_bytes()?;
            let raw = self.transport.transmit(&frame)?;
            let response = ApduResponse::from_bytes(&raw)?;
            command.parse_response(&response)?;
        }
        Ok(())
    }

    /// In-session plain path: commands go to the transport as ordered
    /// batches, split so the accumulator sees every request/response pair in
    /// exchange order
    ///
    /// A run of status-only commands forms one batch: their success
    /// responses are assumed at the right position of the fold before
    /// transmission. A data-returning command ends the batch, because its
    /// actual response must be folded in before the next request is.
    fn process_batched(&mut self, commands: &mut [CardCommand]) -> Result<()> {
        let mut start = 0;
        while start < commands.len() {
            let mut end = start;
            while end < commands.len() && commands[end].sync_mode() == SyncMode::Anticipated {
                end += 1;
            }
            if end < commands.len() {
                // include the data-returning command closing this run
                end += 1;
            }
            self.transmit_batch_segment(&mut commands[start..end])?;
            start = end;
        }
        Ok(())
    }

    fn transmit_batch_segment(&mut self, commands: &mut [CardCommand]) -> Result<()> {
        let mut frames = Vec::with_capacity(commands.len());
        for command in commands.iter() {
            let request = command.request()?;
            sync::prepare_request(&mut self.crypto, request, command.sync_mode(), false)?;
            frames.push(request.to_bytes()?);
        }

        let raw_responses = self.transport.transmit_batch(&frames)?;
        if raw_responses.len() != frames.len() {
            return Err(Error::Desynchronized {
                requests: frames.len(),
                responses: raw_responses.len(),
            });
        }

        for (command, raw) in commands.iter_mut().zip(&raw_responses) {
            let response = ApduResponse::from_bytes(raw)?;
            sync::absorb_response(&mut self.crypto, &response, command.sync_mode(), false)?;
            command.parse_response(&response)?;
            self.command_log.push(command.command_ref());
        }
        debug!(count = commands.len(), "session batch executed");
        Ok(())
    }

    /// In-session encrypted path: every command round-trips individually
    /// through the cipher
    fn process_encrypted(&mut self, commands: &mut [CardCommand]) -> Result<()> {
        for command in commands.iter_mut() {
            let request = command.request()?.clone();
            let rewritten =
                sync::prepare_request(&mut self.crypto, &request, command.sync_mode(), true)?;
            let response = self.transmit_one(rewritten.as_ref().unwrap_or(&request))?;
            let plain =
                sync::absorb_response(&mut self.crypto, &response, command.sync_mode(), true)?;
            command.parse_response(plain.as_ref().unwrap_or(&response))?;
            self.command_log.push(command.command_ref());
        }
        Ok(())
    }

    /// Close the session and authenticate both sides
    ///
    /// Returns the data the card postponed to session close (SV signature
    /// material; empty otherwise). A signature mismatch is fatal but still
    /// releases the transport channel.
    pub fn close_session(&mut self) -> Result<Bytes> {
        let result = self.close_session_inner();
        if result.is_err() {
            self.state = SessionState::Closed;
            self.buffer = None;
            self.command_log.clear();
            if matches!(result, Err(Error::SessionAuthenticationFailed)) {
                let _ = self.transport.reset();
            }
        }
        result
    }

    fn close_session_inner(&mut self) -> Result<Bytes> {
        if self.state != SessionState::Open {
            return Err(Error::InvalidState("no session open"));
        }

        let terminal_signature = self
            .crypto
            .finalize_session()
            .map_err(Error::CryptoSynchronizationFailed)?;
        let mut cmd = CloseSessionCmd::new(
            &self.card,
            &terminal_signature,
            self.settings.is_ratification_on_close(),
        )?;

        self.state = SessionState::AwaitingClose;
        let response = self.transmit_one(cmd.request())?;
        cmd.parse_response(&response)?;

        let card_signature = cmd
            .card_signature()
            .cloned()
            .ok_or(Error::InvalidResponse(
                CommandRef::CloseSession,
                "card signature missing after parse",
            ))?;
        self.crypto
            .verify_card_signature(&card_signature)
            .map_err(|err| match err {
                CryptoError::SignatureMismatch => Error::SessionAuthenticationFailed,
                other => Error::CryptoSynchronizationFailed(other),
            })?;

        self.state = SessionState::Closed;
        self.buffer = None;
        self.command_log.clear();
        info!("secure session closed, card authenticated");
        Ok(cmd.postponed_data().cloned().unwrap_or_default())
    }

    /// Drop the session without closing it card-side and release the channel
    ///
    /// Idempotent; the card aborts its half when the channel resets.
    pub fn abort_session(&mut self) -> Result<()> {
        if self.state != SessionState::Closed {
            warn!("secure session aborted by caller");
        }
        self.state = SessionState::Closed;
        self.buffer = None;
        self.command_log.clear();
        self.transport.reset()?;
        Ok(())
    }

    fn transmit_one(&mut self, request: &ApduRequest) -> Result<ApduResponse> {
        let frame = request.to_bytes()?;
        debug!(frame = %hex::encode_upper(&frame), "transmitting frame");
        let raw = self.transport.transmit(&frame)?;
        debug!(response = %hex::encode_upper(&raw), "received frame");
        Ok(ApduResponse::from_bytes(&raw)?)
    }
}
