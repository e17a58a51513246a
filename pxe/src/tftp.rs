//! TFTP client seam.
//!
//! The TFTP protocol itself lives outside this crate. The stack drives
//! whatever client the platform plugs in and only adds what the PXE calls
//! need on top: session bookkeeping and whole-file reads into a caller
//! buffer.

use morpheus_undi::NicControl;

use crate::status::Status;

/// Well-known TFTP server port.
pub const TFTP_PORT: u16 = 69;

/// RFC 1350 block size, used when the caller does not ask for another.
pub const DEFAULT_BLOCK_SIZE: u16 = 512;

/// Parameters of a TFTP transfer.
#[derive(Debug, Clone, Copy)]
pub struct TftpRequest<'a> {
    pub server_ip: [u8; 4],
    /// Zero when the server is on-link.
    pub gateway_ip: [u8; 4],
    /// File name, without the trailing NUL.
    pub filename: &'a [u8],
    /// Server port (69 unless the caller says otherwise).
    pub port: u16,
    /// Requested block size.
    pub packet_size: u16,
}

/// One data block returned by `TftpClient::read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TftpBlock {
    pub packet_number: u16,
    pub len: usize,
}

/// A TFTP client running over the stack's adapter.
///
/// Errors are reported as the PXE status the caller should see
/// (`TFTP_FILE_NOT_FOUND`, `TFTP_CANNOT_OPEN_CONNECTION`, ...).
pub trait TftpClient: Send {
    /// Open a transfer; returns the negotiated block size.
    fn open(&mut self, nic: &mut dyn NicControl, request: &TftpRequest<'_>) -> Result<u16, Status>;

    /// Next data block. A block shorter than the negotiated size is the last.
    ///
    /// Fails with `OUT_OF_RESOURCES` if `buf` cannot hold the block.
    fn read(&mut self, nic: &mut dyn NicControl, buf: &mut [u8]) -> Result<TftpBlock, Status>;

    fn close(&mut self, nic: &mut dyn NicControl);

    fn file_size(&mut self, nic: &mut dyn NicControl, request: &TftpRequest<'_>) -> Result<u32, Status>;

    /// Read a whole file into `buf`; returns the file length.
    ///
    /// Fails with `OUT_OF_RESOURCES` if the file does not fit.
    fn read_file(
        &mut self,
        nic: &mut dyn NicControl,
        request: &TftpRequest<'_>,
        buf: &mut [u8],
    ) -> Result<usize, Status> {
        let block_size = usize::from(self.open(nic, request)?);
        let mut total = 0usize;
        let result = loop {
            let window_end = (total + block_size).min(buf.len());
            let block = match self.read(nic, &mut buf[total..window_end]) {
                Ok(block) => block,
                Err(status) => break Err(status),
            };
            if total == buf.len() {
                // Buffer full: only an empty final block ends the file here.
                break if block.len == 0 { Ok(total) } else { Err(Status::OUT_OF_RESOURCES) };
            }
            total += block.len;
            if block.len < block_size {
                break Ok(total);
            }
        };
        self.close(nic);
        result
    }
}
