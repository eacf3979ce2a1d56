// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: tests/dispatcher_test.rs
// Version: 1.0.1
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains integration tests for the dispatcher: failover and
// failback, work assignment to flagged workers, result checking and
// submission, worker removal and the session outcome when servers run out.
//
// Tree Location:
// - tests/dispatcher_test.rs (dispatcher integration tests)
// - Depends on: graxil-solo, tokio, async-trait, crossbeam

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use crossbeam::channel::TryRecvError;
    use graxil_solo::core::difficulty::bits_to_target;
    use graxil_solo::core::server::{Scheme, Server};
    use graxil_solo::core::transaction::swap_words;
    use graxil_solo::core::types::{BlockTemplate, FailoverPolicy, Job, MinerOptions, WorkResult};
    use graxil_solo::miner::{
        nonce_range, Dispatcher, MinerError, ServerChange, ServerStatus, Worker, WorkerLink,
    };
    use graxil_solo::source::{LongPollTarget, SourceError, SourceExit, WorkSource};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    const GENESIS_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";
    const GENESIS_NONCE: u32 = 0x7c2bac1d;
    const GENESIS_TIME: u32 = 0x495fab29;

    struct MockWorker {
        links: Arc<Mutex<Vec<WorkerLink>>>,
        stopped: Arc<AtomicBool>,
    }

    impl Worker for MockWorker {
        fn name(&self) -> String {
            "mock".to_string()
        }

        fn start(&mut self, link: WorkerLink) -> Result<(), MinerError> {
            self.links.lock().unwrap().push(link);
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone)]
    enum Reply {
        Accept,
        Reject(&'static str),
        Reset,
        Unauthorized,
    }

    struct MockSource {
        server: Arc<Server>,
        reply: Reply,
        diversion: Option<String>,
        exit: fn() -> SourceExit,
        submissions: Mutex<Vec<(u32, u32)>>,
    }

    impl MockSource {
        fn new(server: Arc<Server>, reply: Reply) -> Self {
            Self {
                server,
                reply,
                diversion: None,
                exit: || SourceExit::AuthFailed,
                submissions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WorkSource for MockSource {
        fn server(&self) -> Arc<Server> {
            self.server.clone()
        }

        async fn fetch_template(
            &self,
            _long_poll: Option<&LongPollTarget>,
            _timeout: Duration,
        ) -> Result<Option<BlockTemplate>, SourceError> {
            Ok(None)
        }

        fn build_job(&self, _template: Option<&BlockTemplate>) -> Result<Option<Job>, SourceError> {
            Ok(None)
        }

        async fn submit_block(&self, _job: &Job, ntime: u32, nonce: u32) -> Result<Option<String>, SourceError> {
            self.submissions.lock().unwrap().push((ntime, nonce));
            match &self.reply {
                Reply::Accept => Ok(None),
                Reply::Reject(reason) => Ok(Some(reason.to_string())),
                Reply::Reset => Err(SourceError::Io(std::io::ErrorKind::ConnectionReset.into())),
                Reply::Unauthorized => Err(SourceError::NotAuthorized),
            }
        }

        async fn propose_block(&self, _job: &Job, _ntime: u32, _nonce: u32) -> Result<Option<String>, SourceError> {
            Ok(None)
        }

        async fn detect_alternate_protocol(&self) -> Result<Option<String>, SourceError> {
            Ok(self.diversion.clone())
        }

        async fn run(self: Arc<Self>, _results: &mut UnboundedReceiver<WorkResult>) -> SourceExit {
            (self.exit)()
        }

        fn stop(&self) {}
    }

    fn servers(count: usize) -> Vec<Server> {
        (0..count)
            .map(|i| Server::new(Scheme::Http, format!("node{}", i), 8332))
            .collect()
    }

    fn policy(tolerance: u32, failback: Duration, wrap: bool) -> FailoverPolicy {
        FailoverPolicy {
            tolerance,
            failback,
            wrap,
        }
    }

    fn genesis_job(server: Arc<Server>) -> Arc<Job> {
        let wire: [u8; 80] = hex::decode(GENESIS_HEADER).unwrap().try_into().unwrap();
        Arc::new(Job::new(
            swap_words(&wire),
            bits_to_target(0x1d00ffff),
            None,
            vec![vec![0xAA]],
            server,
            0,
            false,
        ))
    }

    fn with_workers(dispatcher: &Dispatcher, count: usize) -> (Arc<Mutex<Vec<WorkerLink>>>, Arc<AtomicBool>) {
        let links = Arc::new(Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicBool::new(false));
        for _ in 0..count {
            dispatcher
                .add_worker(Box::new(MockWorker {
                    links: links.clone(),
                    stopped: stopped.clone(),
                }))
                .unwrap();
        }
        (links, stopped)
    }

    fn fail_current(dispatcher: &Dispatcher) -> ServerChange {
        dispatcher.record_connection_outcome(&dispatcher.current_server(), false)
    }

    #[test]
    fn test_failover_after_tolerance() {
        let dispatcher = Dispatcher::new(servers(3), policy(2, Duration::from_secs(60), true), MinerOptions::default()).unwrap();
        assert_eq!(fail_current(&dispatcher), ServerChange::Unchanged);
        assert_eq!(dispatcher.current_index(), 0);
        match fail_current(&dispatcher) {
            ServerChange::Switched(server) => assert_eq!(server.host, "node1"),
            other => panic!("expected failover, got {:?}", other),
        }
        assert_eq!(dispatcher.current_index(), 1);
        assert_eq!(dispatcher.server_errors(0), 0, "Counter resets on failover");
    }

    #[test]
    fn test_wrap_and_halt_at_list_end() {
        let wrapping = Dispatcher::new(servers(2), policy(1, Duration::from_secs(60), true), MinerOptions::default()).unwrap();
        fail_current(&wrapping);
        fail_current(&wrapping);
        assert_eq!(wrapping.current_index(), 0, "Wraps back to the primary");

        let halting = Dispatcher::new(servers(2), policy(1, Duration::from_secs(60), false), MinerOptions::default()).unwrap();
        fail_current(&halting);
        assert_eq!(fail_current(&halting), ServerChange::Exhausted);
        assert!(halting.is_halted());
        assert!(halting.select_server().is_none());
    }

    #[test]
    fn test_failback_after_interval() {
        let dispatcher = Dispatcher::new(servers(2), policy(1, Duration::from_millis(50), true), MinerOptions::default()).unwrap();
        fail_current(&dispatcher);
        assert_eq!(dispatcher.current_index(), 1);
        assert!(!dispatcher.failback_due());
        assert_eq!(dispatcher.select_server().unwrap().host, "node1");

        std::thread::sleep(Duration::from_millis(80));
        assert!(dispatcher.failback_due());
        assert_eq!(dispatcher.select_server().unwrap().host, "node0");
        assert_eq!(dispatcher.current_index(), 0);
        assert!(!dispatcher.failback_due(), "No failback while on the primary");
    }

    #[test]
    fn test_assign_work_only_to_flagged_workers() {
        let dispatcher = Dispatcher::new(servers(1), FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let (links, _) = with_workers(&dispatcher, 2);

        let first = genesis_job(dispatcher.current_server());
        assert_eq!(dispatcher.assign_work(first.clone()), 2, "Fresh workers want work");
        {
            let links = links.lock().unwrap();
            for (index, link) in links.iter().enumerate() {
                let assignment = link.assignments.try_recv().unwrap();
                assert!(Arc::ptr_eq(&assignment.job, &first));
                assert_eq!(assignment.range, nonce_range(index, 2));
                assert!(!link.status.wants_update());
            }
            links[0].request_update();
        }
        assert!(dispatcher.has_updatable_workers());

        let second = genesis_job(dispatcher.current_server());
        assert_eq!(dispatcher.assign_work(second.clone()), 1);
        {
            let links = links.lock().unwrap();
            assert!(Arc::ptr_eq(&links[0].assignments.try_recv().unwrap().job, &second));
            assert!(matches!(links[1].assignments.try_recv(), Err(TryRecvError::Empty)));
        }
        let ids = dispatcher.worker_ids();
        assert!(Arc::ptr_eq(&dispatcher.worker_job(ids[1]).unwrap(), &first), "Unflagged worker keeps its job");

        let third = genesis_job(dispatcher.current_server());
        assert_eq!(dispatcher.supersede_work(third), 2, "Superseding work reaches everyone");
    }

    #[test]
    fn test_failover_flags_workers_for_new_work() {
        let dispatcher = Dispatcher::new(servers(2), policy(1, Duration::from_secs(3600), true), MinerOptions::default()).unwrap();
        let (_links, _) = with_workers(&dispatcher, 2);
        let first = dispatcher.current_server();
        assert_eq!(dispatcher.assign_work(genesis_job(first.clone())), 2);
        assert!(!dispatcher.has_updatable_workers());

        fail_current(&dispatcher);
        assert!(!dispatcher.is_current(&first));
        assert!(dispatcher.has_updatable_workers(), "Work from the old server is stale");
        assert_eq!(dispatcher.assign_work(genesis_job(first)), 0);
        assert_eq!(dispatcher.assign_work(genesis_job(dispatcher.current_server())), 2);
    }

    #[test]
    fn test_job_from_retired_server_is_dropped() {
        let dispatcher = Dispatcher::new(servers(2), FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let _workers = with_workers(&dispatcher, 1);
        let stranger = Arc::new(Server::new(Scheme::Http, "node0", 8332));
        assert_eq!(dispatcher.assign_work(genesis_job(stranger)), 0);
        assert!(!dispatcher.ever_assigned());
    }

    #[tokio::test]
    async fn test_accept_result_submits_once() {
        let dispatcher = Dispatcher::new(servers(1), FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let source = MockSource::new(dispatcher.current_server(), Reply::Accept);
        let job = genesis_job(dispatcher.current_server());

        let result = WorkResult::new(job.clone(), GENESIS_NONCE, GENESIS_TIME, 0);
        assert!(dispatcher.accept_result(&source, result.clone()).await.unwrap());
        assert!(!dispatcher.accept_result(&source, result).await.unwrap(), "Duplicates are discarded");
        assert_eq!(source.submissions.lock().unwrap().as_slice(), &[(GENESIS_TIME, GENESIS_NONCE)]);

        let stats = dispatcher.stats();
        assert_eq!(stats.blocks_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.duplicates.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_accept_result_rejects_below_target() {
        let dispatcher = Dispatcher::new(servers(1), FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let source = MockSource::new(dispatcher.current_server(), Reply::Accept);
        let job = genesis_job(dispatcher.current_server());

        let result = WorkResult::new(job, GENESIS_NONCE + 1, GENESIS_TIME, 0);
        assert!(!dispatcher.accept_result(&source, result).await.unwrap());
        assert!(source.submissions.lock().unwrap().is_empty());
        assert_eq!(dispatcher.stats().candidates_below_target.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_submission_outcomes() {
        let dispatcher = Dispatcher::new(servers(2), policy(2, Duration::from_secs(60), true), MinerOptions::default()).unwrap();
        let job = genesis_job(dispatcher.current_server());
        let result = WorkResult::new(job.clone(), GENESIS_NONCE, GENESIS_TIME, 0);

        let rejecting = MockSource::new(dispatcher.current_server(), Reply::Reject("bad-prevblk"));
        assert!(!dispatcher.accept_result(&rejecting, result).await.unwrap());
        let recent = dispatcher.stats().recent_blocks();
        assert_eq!(recent[0].reason.as_deref(), Some("bad-prevblk"));

        // Each job records what it submitted, so use fresh jobs below.
        let resetting = MockSource::new(dispatcher.current_server(), Reply::Reset);
        let result = WorkResult::new(genesis_job(dispatcher.current_server()), GENESIS_NONCE, GENESIS_TIME, 0);
        assert!(!dispatcher.accept_result(&resetting, result).await.unwrap());
        assert_eq!(dispatcher.server_errors(0), 1, "Transport failures count against the server");
        assert_eq!(resetting.submissions.lock().unwrap().len(), 1, "Never resubmitted");

        let refusing = MockSource::new(dispatcher.current_server(), Reply::Unauthorized);
        let result = WorkResult::new(genesis_job(dispatcher.current_server()), GENESIS_NONCE, GENESIS_TIME, 0);
        assert!(matches!(
            dispatcher.accept_result(&refusing, result).await,
            Err(SourceError::NotAuthorized)
        ));
    }

    #[test]
    fn test_remove_worker_stops_and_detaches() {
        let dispatcher = Dispatcher::new(servers(1), FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let (links, stopped) = with_workers(&dispatcher, 1);
        let id = dispatcher.worker_ids()[0];

        dispatcher.remove_worker(id).unwrap();
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(dispatcher.worker_count(), 0);
        assert!(matches!(
            links.lock().unwrap()[0].assignments.try_recv(),
            Err(TryRecvError::Disconnected)
        ));
        assert!(dispatcher.remove_worker(id).is_err());
    }

    #[tokio::test]
    async fn test_run_without_workers() {
        let dispatcher = Dispatcher::new(servers(1), FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let outcome = dispatcher
            .run(|server| -> Arc<dyn WorkSource> { Arc::new(MockSource::new(server, Reply::Accept)) })
            .await;
        assert!(matches!(outcome, Err(MinerError::NoWorkers)));
    }

    #[tokio::test]
    async fn test_run_ends_when_every_server_is_unusable() {
        let mut list = vec![Server::new(Scheme::Stratum, "pool", 3333)];
        list.extend(servers(2));
        let dispatcher = Dispatcher::new(list, FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let _workers = with_workers(&dispatcher, 1);

        let outcome = dispatcher
            .run(|server| -> Arc<dyn WorkSource> {
                let mut source = MockSource::new(server.clone(), Reply::Accept);
                if server.host == "node1" {
                    source.diversion = Some("stratum.node1:3333".to_string());
                }
                Arc::new(source)
            })
            .await;

        assert!(matches!(outcome, Err(MinerError::NoWorkReceived)));
        assert_eq!(dispatcher.server_status(0), Some(ServerStatus::Unsupported));
        assert_eq!(dispatcher.server_status(1), Some(ServerStatus::AuthFailed));
        assert_eq!(
            dispatcher.server_status(2),
            Some(ServerStatus::Diverted("stratum.node1:3333".to_string()))
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dispatcher = Dispatcher::new(servers(1), FailoverPolicy::default(), MinerOptions::default()).unwrap();
        let _workers = with_workers(&dispatcher, 1);
        dispatcher.shutdown();
        let outcome = dispatcher
            .run(|server| -> Arc<dyn WorkSource> {
                let mut source = MockSource::new(server, Reply::Accept);
                source.exit = || SourceExit::Shutdown;
                Arc::new(source)
            })
            .await;
        assert!(outcome.is_ok());
    }
}

// Changelog:
// - v1.0.1 (2025-07-09): Connection outcomes name the reporting server.
//   - Failover flags every worker for work from the new server.
// - v1.0.0 (2025-07-05): Initial dispatcher tests.
//   - Features: Failover, wrap and halt, failback, work assignment to workers
//     that asked for it, at-most-once submission and run loop exits, driven
//     by mock workers and sources.
