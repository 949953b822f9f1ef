//! Output discovery
//!
//! Picks the output to drive: the first connected connector, its encoder
//! and that encoder's CRTC. Runs once per process at bind time.

use log::{debug, info};

use crate::error::DiscoveryError;

/// Anything reporting a pixel size for a display mode
pub trait ModeSize {
    fn size(&self) -> (u16, u16);
}

impl ModeSize for drm::control::Mode {
    fn size(&self) -> (u16, u16) {
        drm::control::Mode::size(self)
    }
}

impl ModeSize for (u16, u16) {
    fn size(&self) -> (u16, u16) {
        *self
    }
}

/// Connector state as seen at discovery time
#[derive(Debug, Clone)]
pub struct ConnectorSnapshot<E, M> {
    pub connected: bool,
    pub current_encoder: Option<E>,
    pub encoders: Vec<E>,
    pub modes: Vec<M>,
}

/// Encoder state as seen at discovery time
#[derive(Debug, Clone)]
pub struct EncoderSnapshot<R> {
    pub crtc: Option<R>,
    /// CRTCs the encoder can drive, in resource order
    pub possible_crtcs: Vec<R>,
}

/// Mode-setting resources to discover an output from
pub trait ResourceSource {
    type Connector: Copy + std::fmt::Debug;
    type Encoder: Copy + std::fmt::Debug;
    type Crtc: Copy + std::fmt::Debug;
    type Mode: ModeSize + Clone;

    fn connectors(&self) -> Vec<Self::Connector>;

    /// `None` if the connector cannot be queried
    fn connector(
        &self,
        handle: Self::Connector,
    ) -> Option<ConnectorSnapshot<Self::Encoder, Self::Mode>>;

    /// `None` if the encoder cannot be queried
    fn encoder(&self, handle: Self::Encoder) -> Option<EncoderSnapshot<Self::Crtc>>;
}

/// The output a process drives
#[derive(Debug, Clone)]
pub struct PhysicalOutput<C, E, R, M> {
    pub connector: C,
    pub encoder: E,
    pub crtc: R,
    /// First mode advertised by the connector
    pub mode: M,
    pub width: u32,
    pub height: u32,
}

/// Output discovered from the KMS resources of a [`ResourceSource`]
pub type DiscoveredOutput<S> = PhysicalOutput<
    <S as ResourceSource>::Connector,
    <S as ResourceSource>::Encoder,
    <S as ResourceSource>::Crtc,
    <S as ResourceSource>::Mode,
>;

/// Select connector, encoder and CRTC
pub fn discover<S: ResourceSource>(source: &S) -> Result<DiscoveredOutput<S>, DiscoveryError> {
    let (connector, info) = source
        .connectors()
        .into_iter()
        .filter_map(|handle| source.connector(handle).map(|info| (handle, info)))
        .find(|(_, info)| info.connected)
        .ok_or(DiscoveryError::NoConnector)?;
    debug!("Found connected connector: {:?}", connector);

    let (encoder, encoder_info) = match info.current_encoder {
        Some(handle) => source.encoder(handle).map(|e| (handle, e)),
        None => info
            .encoders
            .iter()
            .find_map(|&handle| source.encoder(handle).map(|e| (handle, e))),
    }
    .ok_or(DiscoveryError::NoEncoder)?;
    debug!("Encoder: {:?}", encoder);

    let crtc = encoder_info
        .crtc
        .or_else(|| encoder_info.possible_crtcs.first().copied())
        .ok_or(DiscoveryError::NoCrtc)?;
    debug!("CRTC: {:?}", crtc);

    let mode = info.modes.first().cloned().ok_or(DiscoveryError::NoMode)?;
    let (width, height) = mode.size();

    info!("Found display configuration: {}x{}", width, height);

    Ok(PhysicalOutput {
        connector,
        encoder,
        crtc,
        mode,
        width: width as u32,
        height: height as u32,
    })
}
