use std::time::Duration;

use ibft_rs::{
    config::Configuration,
    events::{CommitBlockEvent, RoundChangeEvent, StartRoundEvent},
    ibft::controller::IbftError,
    replica::{Replica, ReplicaSpec},
    types::{
        block::Block,
        crypto_primitives::{address_of, SigningKey},
        data_types::{Address, BlockHeight},
        validator_set::ValidatorSet,
    },
};

use crate::common::{
    chain::TestChain,
    logging::{first_seven_base64_chars, log_with_context},
    network::NetworkStub,
};

/// Things the Nodes will have in common:
/// - Genesis block.
/// - Validator set.
/// - Configuration, apart from the keypair.
///
/// Things that they will differ in:
/// - Chain instance.
/// - Network instance.
/// - Keypair.
pub(crate) struct Node {
    address: Address,
    chain: TestChain,
    replica: Replica,
}

impl Node {
    pub(crate) fn new(
        keypair: SigningKey,
        network: NetworkStub,
        genesis: Block,
        validators: ValidatorSet,
    ) -> Node {
        let address = address_of(&keypair.verifying_key());
        let chain = TestChain::new(genesis, validators);

        let configuration = Configuration::builder()
            .me(keypair)
            .block_period(Duration::from_millis(100))
            .request_timeout(Duration::from_millis(1000))
            .log_events(true)
            .build();

        let replica = ReplicaSpec::builder()
            .app(chain.clone())
            .network(network)
            .configuration(configuration)
            .on_start_round(start_round_handler(address))
            .on_round_change(round_change_handler(address))
            .on_commit_block(commit_block_handler(address))
            .build()
            .start();

        Node {
            address,
            chain,
            replica,
        }
    }

    pub(crate) fn height(&self) -> BlockHeight {
        self.chain.height()
    }

    pub(crate) fn chain(&self) -> &TestChain {
        &self.chain
    }

    pub(crate) fn address(&self) -> Address {
        self.address
    }

    /// Stop the replica, returning the error its processor stopped with, if any.
    pub(crate) fn stop(self) -> Result<(), IbftError> {
        self.replica.stop()
    }
}

fn start_round_handler(address: Address) -> impl Fn(&StartRoundEvent) + Send + 'static {
    move |start_round_event| {
        log_with_context(
            Some(address),
            &format!(
                "Started Round, round: {}, timeout: {:?}",
                start_round_event.round, start_round_event.timeout
            ),
        );
    }
}

fn round_change_handler(address: Address) -> impl Fn(&RoundChangeEvent) + Send + 'static {
    move |round_change_event| {
        log_with_context(
            Some(address),
            &format!(
                "Sent Round Change, round: {}, prepared: {}",
                round_change_event.round_change.round,
                round_change_event.round_change.prepared_certificate.is_some()
            ),
        );
    }
}

fn commit_block_handler(address: Address) -> impl Fn(&CommitBlockEvent) + Send + 'static {
    move |commit_block_event| {
        log_with_context(
            Some(address),
            &format!(
                "Committed Block, block hash: {}, round: {}, no. of commit seals: {}",
                first_seven_base64_chars(&commit_block_event.block.bytes()),
                commit_block_event.round,
                commit_block_event.commit_seals
            ),
        );
    }
}
