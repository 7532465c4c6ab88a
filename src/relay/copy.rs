//! Bidirectional byte relay for established tunnels
//!
//! Each direction owns one fixed receive buffer. A direction reads into its
//! buffer, then writes those exact bytes to the opposite endpoint before
//! reading again, so the buffer is never overrun and backpressure falls out
//! naturally: a slow writer keeps the opposite reader parked. EOF on one
//! direction shuts down the peer's write half; the relay resolves once both
//! directions are done.
//!
//! The `poll`-level plumbing follows the `CopyBuffer`/`CopyBidirectional`
//! shape from the [tokio](https://github.com/tokio-rs/tokio) project (MIT).

use std::{
    fmt::{self, Debug},
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
};

use futures::ready;
use log::{debug, trace};
use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

struct RelayBuffer {
    read_done: bool,
    pos: usize,
    cap: usize,
    amt: u64,
    buf: Box<[u8]>,
}

impl Debug for RelayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RelayBuffer")
            .field("read_done", &self.read_done)
            .field("pos", &self.pos)
            .field("cap", &self.cap)
            .field("amt", &self.amt)
            .finish_non_exhaustive()
    }
}

impl RelayBuffer {
    fn new(buffer_size: usize) -> Self {
        Self {
            read_done: false,
            pos: 0,
            cap: 0,
            amt: 0,
            buf: vec![0; buffer_size].into_boxed_slice(),
        }
    }

    fn poll_copy<R, W>(
        &mut self,
        cx: &mut Context<'_>,
        mut reader: Pin<&mut R>,
        mut writer: Pin<&mut W>,
    ) -> Poll<io::Result<u64>>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        loop {
            // Only read once the previous chunk is fully written out; the
            // buffer belongs to the write path until then.
            if self.pos == self.cap && !self.read_done {
                let me = &mut *self;
                let mut buf = ReadBuf::new(&mut me.buf);
                ready!(reader.as_mut().poll_read(cx, &mut buf))?;
                let n = buf.filled().len();
                if n == 0 {
                    self.read_done = true;
                } else {
                    self.pos = 0;
                    self.cap = n;
                }
            }

            // Drain the buffer into the opposite endpoint.
            while self.pos < self.cap {
                let me = &mut *self;
                let i = ready!(writer.as_mut().poll_write(cx, &me.buf[me.pos..me.cap]))?;
                if i == 0 {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "write zero byte into writer",
                    )));
                } else {
                    self.pos += i;
                    self.amt += i as u64;
                }
            }

            if self.pos == self.cap && self.read_done {
                ready!(writer.as_mut().poll_flush(cx))?;
                return Poll::Ready(Ok(self.amt));
            }
        }
    }
}

#[derive(Debug)]
enum TransferState {
    Running(RelayBuffer),
    ShuttingDown(u64),
    Done(u64),
}

fn transfer_one_direction<A, B>(
    cx: &mut Context<'_>,
    state: &mut TransferState,
    mut r: Pin<&mut A>,
    mut w: Pin<&mut B>,
) -> Poll<io::Result<u64>>
where
    A: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    loop {
        match state {
            TransferState::Running(buf) => {
                let count = ready!(buf.poll_copy(cx, r.as_mut(), w.as_mut()))?;
                *state = TransferState::ShuttingDown(count);
            }
            TransferState::ShuttingDown(count) => {
                ready!(w.as_mut().poll_shutdown(cx))?;
                *state = TransferState::Done(*count);
            }
            TransferState::Done(count) => return Poll::Ready(Ok(*count)),
        }
    }
}

#[pin_project(project = RelayBidirectionalProj)]
struct RelayBidirectional<'a, A: ?Sized, B: ?Sized> {
    #[pin]
    client: &'a mut A,
    #[pin]
    upstream: &'a mut B,
    c2u: TransferState,
    u2c: TransferState,
}

impl<A, B> Future for RelayBidirectional<'_, A, B>
where
    A: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    type Output = io::Result<(u64, u64)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let RelayBidirectionalProj {
            mut client,
            mut upstream,
            c2u,
            u2c,
        } = self.project();

        let poll_c2u = transfer_one_direction(cx, c2u, client.as_mut(), upstream.as_mut());
        let poll_u2c = transfer_one_direction(cx, u2c, upstream.as_mut(), client.as_mut());

        match (poll_c2u, poll_u2c) {
            (Poll::Ready(Ok(c2u)), Poll::Ready(Ok(u2c))) => {
                trace!("relay ends, C2U {c2u} bytes, U2C {u2c} bytes");
                Poll::Ready(Ok((c2u, u2c)))
            }
            (Poll::Ready(Err(err)), _) | (_, Poll::Ready(Err(err))) => {
                debug!("relay ends with error: {err}");
                Poll::Ready(Err(err))
            }
            // One direction may finish (and shut its writer down) while the
            // other keeps streaming; it will keep reporting Done until both
            // resolve.
            _ => Poll::Pending,
        }
    }
}

/// Relays bytes between `client` and `upstream` in both directions until
/// both directions have seen EOF and shut down, or either errors.
///
/// Returns the byte counts relayed client-to-upstream and
/// upstream-to-client, in that order.
pub async fn relay_bidirectional<A, B>(
    client: &mut A,
    upstream: &mut B,
    buffer_size: usize,
) -> io::Result<(u64, u64)>
where
    A: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    RelayBidirectional {
        client,
        upstream,
        c2u: TransferState::Running(RelayBuffer::new(buffer_size)),
        u2c: TransferState::Running(RelayBuffer::new(buffer_size)),
    }
    .await
}
