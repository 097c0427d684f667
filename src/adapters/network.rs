//! Composite network port.
//!
//! The supervisor drives three ports at once (link, credential exchange,
//! restart).  [`Network`] bundles one adapter for each and forwards every
//! call, so the supervisor takes a single `&mut` argument.

use crate::app::ports::{Credentials, LinkPort, ProvisioningPort, RestartPort};
use crate::error::{LinkError, ProvisioningError};

pub struct Network<L, P, R> {
    pub link: L,
    pub provisioning: P,
    pub restart: R,
}

impl<L, P, R> Network<L, P, R> {
    pub fn new(link: L, provisioning: P, restart: R) -> Self {
        Self {
            link,
            provisioning,
            restart,
        }
    }
}

impl<L: LinkPort, P, R> LinkPort for Network<L, P, R> {
    fn request_connect(&mut self) -> Result<(), LinkError> {
        self.link.request_connect()
    }

    fn enter_station_mode(&mut self) {
        self.link.enter_station_mode();
    }

    fn apply_credentials(&mut self, creds: &Credentials) -> Result<(), LinkError> {
        self.link.apply_credentials(creds)
    }

    fn set_auto_connect(&mut self, enabled: bool) {
        self.link.set_auto_connect(enabled);
    }
}

impl<L, P: ProvisioningPort, R> ProvisioningPort for Network<L, P, R> {
    fn stop_provisioning(&mut self) {
        self.provisioning.stop_provisioning();
    }

    fn start_provisioning(&mut self) -> Result<(), ProvisioningError> {
        self.provisioning.start_provisioning()
    }

    fn poll_credentials(&mut self) -> Option<Credentials> {
        self.provisioning.poll_credentials()
    }
}

impl<L, P, R: RestartPort> RestartPort for Network<L, P, R> {
    fn restart(&mut self) {
        self.restart.restart();
    }
}
