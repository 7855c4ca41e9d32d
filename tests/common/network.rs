use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use ibft_rs::{
    networking::{messages::Message, network::Network},
    types::data_types::Address,
};

/// A mock network stub which passes messages from and to threads using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_address: Address,
    all_peers: HashMap<Address, Sender<(Address, Message)>>,
    inbox: Arc<Mutex<Receiver<(Address, Message)>>>,
}

impl Network for NetworkStub {
    fn broadcast(&mut self, message: Message, exclude: &[Address]) {
        for (address, peer) in &self.all_peers {
            if *address != self.my_address && !exclude.contains(address) {
                // Peers that are not running have dropped their inbox.
                let _ = peer.send((self.my_address, message.clone()));
            }
        }
    }

    fn recv(&mut self) -> Option<(Address, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(origin_and_message) => Some(origin_and_message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Create one connected network stub for each of `peers`, in the same order.
pub(crate) fn mock_network(peers: impl Iterator<Item = Address>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(Address, Receiver<(Address, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_address, inbox)| NetworkStub {
            my_address,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
