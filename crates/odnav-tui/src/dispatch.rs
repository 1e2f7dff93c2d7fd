// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use odnav_app::{Completion, RemoteService, Request};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

/// Runs each request on its own worker thread and posts the single
/// completion back on the channel. Nothing here ever blocks the caller.
#[derive(Clone)]
pub struct Dispatcher {
    remote: Arc<dyn RemoteService>,
    tx: Sender<Completion>,
}

impl Dispatcher {
    pub fn new(remote: Arc<dyn RemoteService>, tx: Sender<Completion>) -> Self {
        Self { remote, tx }
    }

    pub fn submit(&self, request: Request) {
        let remote = Arc::clone(&self.remote);
        let tx = self.tx.clone();
        let description = request.describe();
        tracing::debug!(target: "odnav::dispatch", "dispatching {description}");
        thread::spawn(move || {
            let completion = request.execute(remote.as_ref());
            if tx.send(completion).is_err() {
                tracing::debug!(target: "odnav::dispatch", "ui gone, dropping result of {description}");
            }
        });
    }

    pub fn submit_all(&self, requests: impl IntoIterator<Item = Request>) {
        for request in requests {
            self.submit(request);
        }
    }
}
