use inkpot_worker::{serve, Options};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::{self, JoinHandle, LocalSet};

/// Host side of a worker connected through in-memory pipes.
struct Host {
    requests: DuplexStream,
    messages: Lines<BufReader<DuplexStream>>,
    worker: JoinHandle<anyhow::Result<()>>,
}

impl Host {
    /// Start a worker; call from inside a `LocalSet`.
    fn start(options: Options) -> Self {
        let (requests, worker_input) = tokio::io::duplex(64 * 1024);
        let (worker_output, messages) = tokio::io::duplex(64 * 1024);
        let worker = task::spawn_local(serve(BufReader::new(worker_input), worker_output, options));
        Self {
            requests,
            messages: BufReader::new(messages).lines(),
            worker,
        }
    }

    async fn send(&mut self, request: Value) {
        self.send_raw(&request.to_string()).await;
    }

    async fn send_raw(&mut self, line: &str) {
        self.requests.write_all(line.as_bytes()).await.unwrap();
        self.requests.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.messages.next_line().await.unwrap().expect("worker closed output");
        serde_json::from_str(&line).unwrap()
    }

    async fn shutdown(self) {
        drop(self.requests);
        self.worker.await.unwrap().unwrap();
    }
}

async fn with_worker<F, Fut>(options: Options, test: F)
where
    F: FnOnce(Host) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    LocalSet::new()
        .run_until(async move { test(Host::start(options)).await })
        .await;
}

#[tokio::test]
async fn test_initialize_and_run_value() {
    with_worker(Options::default(), |mut host| async move {
        host.send(json!({ "type": "initialize" })).await;
        assert_eq!(host.recv().await, json!({ "type": "initialized" }));

        host.send(json!({ "type": "run", "cellId": "c1", "code": "print('hi')\n1 + 1" }))
            .await;
        assert_eq!(
            host.recv().await,
            json!({ "type": "execute_result", "cellId": "c1", "result": { "text/plain": "2" } })
        );
        assert_eq!(
            host.recv().await,
            json!({ "type": "execute_completed", "cellId": "c1", "stdout": "hi\n", "stderr": "" })
        );
        host.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn test_input_round_trip() {
    with_worker(Options::default(), |mut host| async move {
        host.send(json!({ "type": "run", "cellId": "c1", "code": "name = input('name: ')" }))
            .await;
        let request = host.recv().await;
        assert_eq!(request["type"], "input_request");
        assert_eq!(request["cellId"], "c1");
        assert_eq!(request["prompt"], "name: ");

        host.send(json!({ "type": "resume", "suspension": request["suspension"], "value": "Ada" }))
            .await;
        assert_eq!(
            host.recv().await,
            json!({ "type": "execute_completed", "cellId": "c1", "stdout": "", "stderr": "" })
        );

        host.send(json!({ "type": "run", "cellId": "c2", "code": "'hello ' + name" }))
            .await;
        assert_eq!(
            host.recv().await,
            json!({ "type": "execute_result", "cellId": "c2", "result": { "text/plain": "'hello Ada'" } })
        );
        assert_eq!(host.recv().await["type"], "execute_completed");
        host.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn test_failure_and_busy_worker() {
    with_worker(Options::default(), |mut host| async move {
        host.send(json!({ "type": "run", "cellId": "a", "code": "x = input()" })).await;
        assert_eq!(host.recv().await["type"], "input_request");

        host.send(json!({ "type": "run", "cellId": "b", "code": "1" })).await;
        let refused = host.recv().await;
        assert_eq!(refused["type"], "error");
        assert_eq!(refused["cellId"], "b");
        assert_eq!(refused["error"], "another cell is already in progress");

        host.send(json!({ "type": "resume", "suspension": 0, "value": "0" })).await;
        assert_eq!(host.recv().await["type"], "execute_completed");

        host.send(json!({ "type": "run", "cellId": "c", "code": "print('hi'); 1/0" }))
            .await;
        assert_eq!(
            host.recv().await,
            json!({
                "type": "error",
                "cellId": "c",
                "error": "ZeroDivisionError: division by zero",
                "stdout": "hi\n",
                "stderr": ""
            })
        );
        host.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn test_bad_requests_are_reported() {
    with_worker(Options::default(), |mut host| async move {
        host.send_raw("not json").await;
        let error = host.recv().await;
        assert_eq!(error["type"], "error");
        assert!(error["error"].as_str().unwrap().starts_with("invalid request"));
        assert!(error.get("cellId").is_none());

        host.send(json!({ "type": "resume", "suspension": 7, "value": "x" })).await;
        assert_eq!(
            host.recv().await["error"],
            "no suspension with id 7 is waiting"
        );
        host.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn test_host_channel_messages() {
    with_worker(Options::default(), |mut host| async move {
        host.send(json!({
            "type": "run",
            "cellId": "h",
            "code": "import host\nhost.text('from host')\nhost.image('iVBOR')"
        }))
        .await;
        assert_eq!(host.recv().await, json!({ "type": "stdout", "text": "from host" }));
        assert_eq!(
            host.recv().await,
            json!({ "type": "execute_result", "result": { "image/png": "iVBOR" } })
        );
        assert_eq!(host.recv().await["type"], "execute_completed");
        host.shutdown().await;
    })
    .await;
}

#[tokio::test]
async fn test_without_rewrite_unawaited_input_is_a_coroutine() {
    let options = Options {
        rewrite: false,
        ..Options::default()
    };
    with_worker(options, |mut host| async move {
        host.send(json!({ "type": "run", "cellId": "r", "code": "input('x')" })).await;
        assert_eq!(
            host.recv().await,
            json!({
                "type": "execute_result",
                "cellId": "r",
                "result": { "text/plain": "<coroutine object input>" }
            })
        );
        assert_eq!(host.recv().await["type"], "execute_completed");
        host.shutdown().await;
    })
    .await;
}
