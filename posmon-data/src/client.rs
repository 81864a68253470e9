//! Dual feed market client.
//!
//! The trading feed carries positions & balances (private, authenticated) or demo tickers
//! (public). The market-data feed always carries public tickers, re-subscribed as the set of
//! open instruments changes.

use crate::{
    config::ClientConfig,
    credentials::Credentials,
    demo::{DemoBook, demo_balance, demo_instruments},
    error::{ClientError, FeedError},
    exchange::okx::{
        message::{OkxDataBatch, OkxDataChannel},
        subscription::OkxSubArg,
    },
    fault::FaultSender,
    feed::{FeedConnection, FeedHandler, FeedWriter, WsSink},
    model::{Balance, Position, PositionKey, PositionUpdate, Ticker},
};
use async_trait::async_trait;
use chrono::Utc;
use derive_more::Display;
use futures::Sink;
use smol_str::SmolStr;
use std::{
    collections::{BTreeSet, HashSet},
    ops::ControlFlow,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Whether the client streams a real account or synthetic demo positions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum ClientMode {
    #[display("demo")]
    Demo,
    #[display("live")]
    Live,
}

/// Which of the two connections a [`RecordRouter`] serves.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum FeedKind {
    #[display("trading")]
    Trading,
    #[display("market data")]
    MarketData,
}

/// Consumer side of the client's bounded channels.
#[derive(Debug)]
pub struct ClientReceivers {
    pub positions: mpsc::Receiver<PositionUpdate>,
    pub balances: mpsc::Receiver<Balance>,
    pub faults: mpsc::Receiver<String>,
}

/// Ticker instruments the market-data feed should follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    /// Full target set, always re-sent in its entirety.
    pub subscribe: Vec<SmolStr>,
    /// Previously subscribed instruments no longer in the target set.
    pub unsubscribe: Vec<SmolStr>,
}

/// Open positions seen on the trading feed, tracked per [`PositionKey`].
///
/// Only full position snapshots change the set; price ticks never do.
#[derive(Debug, Clone)]
pub struct WorkingSet {
    open: HashSet<PositionKey>,
    subscribed: BTreeSet<SmolStr>,
    fallback: BTreeSet<SmolStr>,
}

impl WorkingSet {
    /// Working set whose market-data subscription starts on the `fallback` instruments.
    pub fn new<I>(fallback: I) -> Self
    where
        I: IntoIterator<Item = SmolStr>,
    {
        let fallback = fallback.into_iter().collect::<BTreeSet<_>>();
        Self {
            open: HashSet::new(),
            subscribed: fallback.clone(),
            fallback,
        }
    }

    /// Record a full position snapshot: non-zero size opens the key, zero size removes it.
    pub fn observe(&mut self, position: &Position) {
        if position.is_open() {
            self.open.insert(position.key());
        } else {
            self.open.remove(&position.key());
        }
    }

    /// Instruments with at least one open position, sorted.
    pub fn instruments(&self) -> BTreeSet<SmolStr> {
        self.open
            .iter()
            .map(|key| key.instrument_id.clone())
            .collect()
    }

    /// Instruments currently subscribed on the market-data feed.
    pub fn subscribed(&self) -> &BTreeSet<SmolStr> {
        &self.subscribed
    }

    /// Compare the target instrument set (fallback when nothing is open) with the current
    /// subscription, returning the change and adopting the target when they differ.
    pub fn take_change(&mut self) -> Option<SubscriptionChange> {
        let instruments = self.instruments();
        let target = if instruments.is_empty() {
            self.fallback.clone()
        } else {
            instruments
        };

        if target == self.subscribed {
            return None;
        }

        let unsubscribe = self.subscribed.difference(&target).cloned().collect();
        let subscribe = target.iter().cloned().collect();
        self.subscribed = target;

        Some(SubscriptionChange {
            subscribe,
            unsubscribe,
        })
    }
}

/// Market-data re-subscription driven by the trading feed's working set.
#[derive(Debug)]
pub struct MarketSubscriptions<S = WsSink> {
    working_set: WorkingSet,
    writer: FeedWriter<S>,
}

impl<S> MarketSubscriptions<S>
where
    S: Sink<Message> + Unpin + Send,
    FeedError: From<S::Error>,
{
    pub fn new(working_set: WorkingSet, writer: FeedWriter<S>) -> Self {
        Self {
            working_set,
            writer,
        }
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Apply any pending working set change to the market-data feed. Runs inline in the
    /// trading read loop so requests on the market-data writer never interleave.
    async fn sync(&mut self, faults: &FaultSender) {
        let Some(change) = self.working_set.take_change() else {
            return;
        };

        let count = change.subscribe.len();
        match self.writer.subscribe(OkxSubArg::tickers(change.subscribe)).await {
            Ok(()) => {
                faults
                    .info(format!("market data re-subscribed to {count} instruments"))
                    .await;
            }
            Err(error) => {
                faults
                    .error(format!("market data re-subscription failed: {error}"))
                    .await;
                return;
            }
        }

        if let Err(error) = self
            .writer
            .unsubscribe(OkxSubArg::tickers(change.unsubscribe))
            .await
        {
            faults
                .error(format!("market data unsubscribe failed: {error}"))
                .await;
        }
    }
}

/// [`FeedHandler`] normalising push data batches and forwarding them downstream.
#[derive(Debug)]
pub struct RecordRouter<S = WsSink> {
    feed: FeedKind,
    positions: mpsc::Sender<PositionUpdate>,
    balances: mpsc::Sender<Balance>,
    faults: FaultSender,
    demo: DemoBook,
    subscriptions: Option<MarketSubscriptions<S>>,
}

impl<S> RecordRouter<S>
where
    S: Sink<Message> + Unpin + Send,
    FeedError: From<S::Error>,
{
    pub fn new(
        feed: FeedKind,
        positions: mpsc::Sender<PositionUpdate>,
        balances: mpsc::Sender<Balance>,
        faults: FaultSender,
        demo: DemoBook,
    ) -> Self {
        Self {
            feed,
            positions,
            balances,
            faults,
            demo,
            subscriptions: None,
        }
    }

    pub fn with_subscriptions(mut self, subscriptions: MarketSubscriptions<S>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    pub fn subscriptions(&self) -> Option<&MarketSubscriptions<S>> {
        self.subscriptions.as_ref()
    }

    async fn forward_positions(&mut self, positions: Vec<Position>) -> ControlFlow<()> {
        for position in positions {
            if let Some(subscriptions) = self.subscriptions.as_mut() {
                subscriptions.working_set.observe(&position);
            }
            if self
                .positions
                .send(PositionUpdate::Snapshot(position))
                .await
                .is_err()
            {
                return ControlFlow::Break(());
            }
        }

        if let Some(subscriptions) = self.subscriptions.as_mut() {
            subscriptions.sync(&self.faults).await;
        }

        ControlFlow::Continue(())
    }

    async fn forward_tickers(&mut self, tickers: Vec<Ticker>) -> ControlFlow<()> {
        for ticker in tickers {
            let updates = match self.demo.merge_ticker(&ticker) {
                Some(merged) => merged.into_iter().map(PositionUpdate::Snapshot).collect(),
                None => vec![PositionUpdate::Price(ticker.price_tick())],
            };

            for update in updates {
                if self.positions.send(update).await.is_err() {
                    return ControlFlow::Break(());
                }
            }
        }

        ControlFlow::Continue(())
    }

    async fn forward_balances(&mut self, balances: Vec<Balance>) -> ControlFlow<()> {
        for balance in balances {
            if self.balances.send(balance).await.is_err() {
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }
}

#[async_trait]
impl<S> FeedHandler for RecordRouter<S>
where
    S: Sink<Message> + Unpin + Send,
    FeedError: From<S::Error>,
{
    async fn handle_batch(&mut self, batch: OkxDataBatch) -> ControlFlow<()> {
        let received = Utc::now();

        match &batch.channel {
            OkxDataChannel::Positions => {
                let positions = batch.positions(received);
                self.faults
                    .info(format!(
                        "{} parsed {} of {} position records",
                        self.feed,
                        positions.len(),
                        batch.len()
                    ))
                    .await;
                self.forward_positions(positions).await
            }
            OkxDataChannel::Account => {
                let balances = batch.balances(received);
                self.faults
                    .info(format!("{} parsed {} balances", self.feed, balances.len()))
                    .await;
                self.forward_balances(balances).await
            }
            OkxDataChannel::Tickers => self.forward_tickers(batch.tickers(received)).await,
            OkxDataChannel::Unknown => {
                let (positions, tickers) = batch.split_untagged(received);
                if self.forward_positions(positions).await.is_break() {
                    return ControlFlow::Break(());
                }
                self.forward_tickers(tickers).await
            }
            OkxDataChannel::Other(channel) => {
                debug!(feed = %self.feed, %channel, items = batch.len(), "ignoring channel");
                ControlFlow::Continue(())
            }
        }
    }
}

/// Owner of the trading & market-data feeds.
pub struct MarketClient {
    config: ClientConfig,
    credentials: Credentials,
    mode: Option<ClientMode>,
    positions: mpsc::Sender<PositionUpdate>,
    balances: mpsc::Sender<Balance>,
    faults: FaultSender,
    demo: DemoBook,
    trading: Option<FeedConnection>,
    market: Option<FeedConnection>,
}

impl MarketClient {
    /// Construct a client and the receivers for its position, balance & fault channels.
    pub fn new(config: ClientConfig, credentials: Credentials) -> (Self, ClientReceivers) {
        let (positions_tx, positions_rx) = mpsc::channel(config.position_capacity);
        let (balances_tx, balances_rx) = mpsc::channel(config.balance_capacity);
        let (faults_tx, faults_rx) = mpsc::channel(config.fault_capacity);

        let client = Self {
            config,
            credentials,
            mode: None,
            positions: positions_tx,
            balances: balances_tx,
            faults: FaultSender::new(faults_tx),
            demo: DemoBook::default(),
            trading: None,
            market: None,
        };

        let receivers = ClientReceivers {
            positions: positions_rx,
            balances: balances_rx,
            faults: faults_rx,
        };

        (client, receivers)
    }

    /// Mode decided by [`Self::connect`], `None` before then.
    pub fn mode(&self) -> Option<ClientMode> {
        self.mode
    }

    /// Connect the market-data feed (best effort), decide demo vs live mode, seed the demo
    /// book if needed, then connect the trading feed. Only a trading feed failure is fatal.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.trading.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        match FeedConnection::connect(
            &self.config.market_feed(),
            None,
            OkxSubArg::tickers(demo_instruments()),
            self.faults.clone(),
        )
        .await
        {
            Ok(market) => self.market = Some(market),
            Err(error) => {
                warn!(%error, "market data feed unavailable, continuing without live prices");
                self.faults
                    .error(format!("market data feed unavailable: {error}"))
                    .await;
            }
        }

        let mode = self.resolve_mode().await;
        if mode == ClientMode::Demo {
            self.seed_demo().await;
        }

        let subscriptions = match mode {
            ClientMode::Live => vec![OkxSubArg::swap_positions(), OkxSubArg::account()],
            ClientMode::Demo => OkxSubArg::tickers(demo_instruments()),
        };
        let credentials = (mode == ClientMode::Live).then_some(&self.credentials);

        match FeedConnection::connect(
            &self.config.trading_feed(mode == ClientMode::Live),
            credentials,
            subscriptions,
            self.faults.clone(),
        )
        .await
        {
            Ok(trading) => {
                info!(%mode, "trading feed connected");
                self.trading = Some(trading);
                Ok(())
            }
            Err(error) => {
                self.faults
                    .error(format!("trading feed connection failed: {error}"))
                    .await;
                if let Some(mut market) = self.market.take() {
                    if let Err(error) = market.close().await {
                        debug!(%error, "market data feed close failed");
                    }
                }
                Err(ClientError::TradingFeed(error))
            }
        }
    }

    /// Validate credentials, clearing them and falling back to demo mode when invalid.
    async fn resolve_mode(&mut self) -> ClientMode {
        let mode = match self.credentials.validate() {
            Ok(()) => {
                self.faults
                    .info("Running in live mode with API credentials")
                    .await;
                ClientMode::Live
            }
            Err(reason) => {
                self.credentials = Credentials::default();
                self.faults
                    .info(format!("Running in demo mode - {reason}"))
                    .await;
                ClientMode::Demo
            }
        };

        self.mode = Some(mode);
        mode
    }

    /// Emit every demo position once as a snapshot, plus the demo balance.
    async fn seed_demo(&self) {
        let now = Utc::now();
        let seeded = self.demo.seed(now);
        let count = seeded.len();

        for position in seeded {
            if self
                .positions
                .send(PositionUpdate::Snapshot(position))
                .await
                .is_err()
            {
                return;
            }
        }
        if let Err(error) = self.balances.send(demo_balance(now)).await {
            debug!(%error, "demo balance dropped, receiver closed");
            return;
        }

        self.faults
            .info(format!("Seeded {count} demo positions"))
            .await;
    }

    /// Run the market-data read loop on its own task and the trading read loop on this one.
    ///
    /// Returns once the trading loop ends, after closing both feeds.
    pub async fn start_listening(self) -> Result<(), ClientError> {
        let Self {
            positions,
            balances,
            faults,
            demo,
            trading,
            market,
            ..
        } = self;

        let mut trading = trading.ok_or(ClientError::NotConnected)?;
        let market_writer = market.as_ref().map(FeedConnection::writer);

        let market_task = market.map(|mut market| {
            let mut router = RecordRouter::<WsSink>::new(
                FeedKind::MarketData,
                positions.clone(),
                balances.clone(),
                faults.clone(),
                demo.clone(),
            );
            tokio::spawn(async move {
                if let Err(error) = market.listen(&mut router).await {
                    warn!(%error, "market data read loop ended");
                }
                if let Err(error) = market.close().await {
                    debug!(%error, "market data feed close failed");
                }
            })
        });

        let mut router = RecordRouter::<WsSink>::new(
            FeedKind::Trading,
            positions,
            balances,
            faults.clone(),
            demo,
        );
        if let Some(writer) = market_writer.clone() {
            router = router.with_subscriptions(MarketSubscriptions::new(
                WorkingSet::new(demo_instruments()),
                writer,
            ));
        }

        let result = trading.listen(&mut router).await;
        if let Err(error) = trading.close().await {
            debug!(%error, "trading feed close failed");
        }

        if let Some(task) = market_task {
            task.abort();
        }
        if let Some(writer) = market_writer {
            if let Err(error) = writer.close().await {
                debug!(%error, "market data feed close failed");
            }
        }

        faults.info("Trading feed stopped").await;
        result.map_err(ClientError::TradingFeed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        demo::DEMO_CATALOG,
        exchange::okx::message::{DecodeResult, decode},
        feed::test_utils::RecordingSink,
        model::PositionSide,
    };

    fn batch(frame: &str) -> OkxDataBatch {
        match decode(frame).unwrap() {
            DecodeResult::Data(batch) => batch,
            other => panic!("expected DecodeResult::Data, got {other:?}"),
        }
    }

    fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    struct Harness {
        router: RecordRouter<RecordingSink>,
        sink: RecordingSink,
        positions: mpsc::Receiver<PositionUpdate>,
        balances: mpsc::Receiver<Balance>,
        _faults: mpsc::Receiver<String>,
    }

    fn harness(feed: FeedKind, demo: DemoBook, fallback: &[&str]) -> Harness {
        let (positions_tx, positions) = mpsc::channel(100);
        let (balances_tx, balances) = mpsc::channel(100);
        let (faults_tx, faults) = mpsc::channel(100);
        let sink = RecordingSink::default();

        let subscriptions = MarketSubscriptions::new(
            WorkingSet::new(fallback.iter().map(|id| SmolStr::new(id))),
            FeedWriter::new(sink.clone()),
        );
        let router = RecordRouter::new(
            feed,
            positions_tx,
            balances_tx,
            FaultSender::new(faults_tx),
            demo,
        )
        .with_subscriptions(subscriptions);

        Harness {
            router,
            sink,
            positions,
            balances,
            _faults: faults,
        }
    }

    fn position(instrument_id: &str, side: PositionSide, size: f64) -> Position {
        Position {
            instrument_id: SmolStr::new(instrument_id),
            side,
            size,
            average_price: 100.0,
            current_price: 100.0,
            unrealized_pnl: 0.0,
            unrealized_pnl_ratio: 0.0,
            leverage: 1.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_working_set_take_change() {
        struct TestCase {
            observe: Vec<Position>,
            expected: Option<SubscriptionChange>,
        }

        let mut working_set = WorkingSet::new([SmolStr::new("BTC-USDT-SWAP"), SmolStr::new("ETH-USDT-SWAP")]);

        let tests = vec![
            TestCase {
                // TC0: nothing open keeps the fallback subscription
                observe: vec![],
                expected: None,
            },
            TestCase {
                // TC1: first open position replaces the fallback
                observe: vec![position("SOL-USDT-SWAP", PositionSide::Long, 1.0)],
                expected: Some(SubscriptionChange {
                    subscribe: vec![SmolStr::new("SOL-USDT-SWAP")],
                    unsubscribe: vec![SmolStr::new("BTC-USDT-SWAP"), SmolStr::new("ETH-USDT-SWAP")],
                }),
            },
            TestCase {
                // TC2: second side of the same instrument leaves the instrument set unchanged
                observe: vec![position("SOL-USDT-SWAP", PositionSide::Short, 2.0)],
                expected: None,
            },
            TestCase {
                // TC3: repeated snapshot is not a change
                observe: vec![position("SOL-USDT-SWAP", PositionSide::Long, 3.0)],
                expected: None,
            },
            TestCase {
                // TC4: new instrument re-sends the full set
                observe: vec![position("ADA-USDT-SWAP", PositionSide::Long, 1.0)],
                expected: Some(SubscriptionChange {
                    subscribe: vec![SmolStr::new("ADA-USDT-SWAP"), SmolStr::new("SOL-USDT-SWAP")],
                    unsubscribe: vec![],
                }),
            },
            TestCase {
                // TC5: closing one side keeps the instrument while the other side is open
                observe: vec![position("SOL-USDT-SWAP", PositionSide::Long, 0.0)],
                expected: None,
            },
            TestCase {
                // TC6: closing everything falls back to the fallback list
                observe: vec![
                    position("SOL-USDT-SWAP", PositionSide::Short, 0.0),
                    position("ADA-USDT-SWAP", PositionSide::Long, 0.0),
                ],
                expected: Some(SubscriptionChange {
                    subscribe: vec![SmolStr::new("BTC-USDT-SWAP"), SmolStr::new("ETH-USDT-SWAP")],
                    unsubscribe: vec![SmolStr::new("ADA-USDT-SWAP"), SmolStr::new("SOL-USDT-SWAP")],
                }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            for position in &test.observe {
                working_set.observe(position);
            }
            let actual = working_set.take_change();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[tokio::test]
    async fn test_router_positions_resubscribe_market_data_inline() {
        let mut harness = harness(FeedKind::Trading, DemoBook::default(), &["BTC-USDT-SWAP"]);

        let flow = harness
            .router
            .handle_batch(batch(
                r#"{"arg":{"channel":"positions","instType":"SWAP"},"data":[
                    {"instId":"ETH-USDT-SWAP","posSide":"long","pos":"1","avgPx":"3000","markPx":"3100"},
                    {"instId":"SOL-USDT-SWAP","posSide":"short","pos":"0","avgPx":"150","markPx":"150"}
                ]}"#,
            ))
            .await;

        assert_eq!(flow, ControlFlow::Continue(()));
        let updates = drain(&mut harness.positions);
        assert_eq!(updates.len(), 2);
        assert!(matches!(&updates[0], PositionUpdate::Snapshot(position) if position.unrealized_pnl == 100.0));

        assert_eq!(
            harness.sink.json(),
            vec![
                serde_json::json!({"op": "subscribe", "args": [{"channel": "tickers", "instId": "ETH-USDT-SWAP"}]}),
                serde_json::json!({"op": "unsubscribe", "args": [{"channel": "tickers", "instId": "BTC-USDT-SWAP"}]}),
            ]
        );

        // Same instrument set, no further requests
        harness
            .router
            .handle_batch(batch(
                r#"{"arg":{"channel":"positions"},"data":[{"instId":"ETH-USDT-SWAP","posSide":"long","pos":"2","avgPx":"3000"}]}"#,
            ))
            .await;
        assert_eq!(harness.sink.json().len(), 2);
    }

    #[tokio::test]
    async fn test_router_live_ticker_forwards_price_delta_only() {
        let mut harness = harness(FeedKind::MarketData, DemoBook::default(), &[]);

        harness
            .router
            .handle_batch(batch(
                r#"{"arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"},"data":[{"instId":"BTC-USDT-SWAP","last":"61000","ts":"1597026383085"}]}"#,
            ))
            .await;

        let updates = drain(&mut harness.positions);
        assert_eq!(updates.len(), 1);
        let PositionUpdate::Price(tick) = &updates[0] else {
            panic!("expected PositionUpdate::Price, got {:?}", updates[0]);
        };
        assert_eq!(tick.instrument_id, "BTC-USDT-SWAP");
        assert_eq!(tick.current_price, 61000.0);
        assert_eq!(tick.timestamp.timestamp_millis(), 1597026383085);
        assert!(harness.sink.json().is_empty());
    }

    #[tokio::test]
    async fn test_router_demo_ticker_pushes_merged_snapshot() {
        let demo = DemoBook::default();
        demo.seed(Utc::now());
        let mut harness = harness(FeedKind::MarketData, demo, &[]);

        harness
            .router
            .handle_batch(batch(
                r#"{"arg":{"channel":"tickers"},"data":[{"instId":"SOL-USDT-SWAP","last":"160"}]}"#,
            ))
            .await;

        let updates = drain(&mut harness.positions);
        assert_eq!(updates.len(), 1);
        let PositionUpdate::Snapshot(position) = &updates[0] else {
            panic!("expected PositionUpdate::Snapshot, got {:?}", updates[0]);
        };
        // SOL demo position is long 50 @ 150
        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.current_price, 160.0);
        assert_eq!(position.unrealized_pnl, 500.0);
    }

    #[tokio::test]
    async fn test_router_balances_and_untagged_batches() {
        let mut harness = harness(FeedKind::Trading, DemoBook::default(), &[]);

        harness
            .router
            .handle_batch(batch(
                r#"{"arg":{"channel":"account"},"data":[{"details":[{"ccy":"USDT","eq":"1200","availBal":"900"}]}]}"#,
            ))
            .await;
        let balances = drain(&mut harness.balances);
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].total_equity, 1200.0);

        harness
            .router
            .handle_batch(batch(
                r#"{"data":[{"instId":"BTC-USDT-SWAP","posSide":"long","pos":"1","avgPx":"60000"},{"instId":"ETH-USDT-SWAP","last":"3000"}]}"#,
            ))
            .await;
        let updates = drain(&mut harness.positions);
        assert!(matches!(updates[0], PositionUpdate::Snapshot(_)));
        assert!(matches!(updates[1], PositionUpdate::Price(_)));
    }

    #[tokio::test]
    async fn test_router_breaks_once_receivers_dropped() {
        let harness = harness(FeedKind::MarketData, DemoBook::default(), &[]);
        let Harness {
            mut router,
            positions,
            ..
        } = harness;
        drop(positions);

        let flow = router
            .handle_batch(batch(
                r#"{"arg":{"channel":"tickers"},"data":[{"instId":"BTC-USDT-SWAP","last":"1"}]}"#,
            ))
            .await;

        assert_eq!(flow, ControlFlow::Break(()));
    }

    #[tokio::test]
    async fn test_invalid_credentials_seed_demo_catalog() {
        let (mut client, mut receivers) = MarketClient::new(
            ClientConfig::default(),
            Credentials::new("your-actual-api-key", "your-actual-api-secret", "pass"),
        );

        assert_eq!(client.resolve_mode().await, ClientMode::Demo);
        assert_eq!(client.credentials, Credentials::default());
        client.seed_demo().await;

        let updates = drain(&mut receivers.positions);
        assert_eq!(updates.len(), DEMO_CATALOG.len());
        for (update, entry) in updates.iter().zip(DEMO_CATALOG.iter()) {
            let PositionUpdate::Snapshot(position) = update else {
                panic!("expected PositionUpdate::Snapshot, got {update:?}");
            };
            assert_eq!(position.instrument_id, entry.instrument_id);
            assert_eq!(position.side, entry.side);
            assert_eq!(position.size, entry.size);
            assert_eq!(position.average_price, entry.average_price);
        }

        let balances = drain(&mut receivers.balances);
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].currency, "USDT");

        let faults = drain(&mut receivers.faults);
        assert!(faults[0].starts_with("DEBUG: Running in demo mode"));
    }

    #[tokio::test]
    async fn test_start_listening_requires_connect() {
        let (client, _receivers) = MarketClient::new(ClientConfig::default(), Credentials::default());

        assert_eq!(
            client.start_listening().await,
            Err(ClientError::NotConnected)
        );
    }

    /// Local WebSocket server sending `frames` to every client, then reading until closed.
    async fn serve(frames: Vec<String>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let frames = frames.clone();
                tokio::spawn(async move {
                    let Ok(mut websocket) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    for frame in frames {
                        if futures::SinkExt::send(&mut websocket, Message::text(frame))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    while let Some(Ok(_)) = futures::StreamExt::next(&mut websocket).await {}
                });
            }
        });

        url
    }

    /// Url of a port with nothing listening on it.
    async fn unreachable() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);
        url
    }

    fn local_config(trading_url: String, market_url: String) -> ClientConfig {
        ClientConfig::default()
            .with_public_url(trading_url)
            .with_market_url(market_url)
            .with_channel_capacity(100, 100, 100)
    }

    #[tokio::test]
    async fn test_connect_market_data_failure_is_not_fatal() {
        let config = local_config(serve(vec![]).await, unreachable().await);
        let (mut client, mut receivers) = MarketClient::new(config, Credentials::default());

        assert_eq!(client.connect().await, Ok(()));
        assert_eq!(client.mode(), Some(ClientMode::Demo));
        assert!(client.market.is_none());
        assert!(client.trading.is_some());

        let faults = drain(&mut receivers.faults);
        assert!(
            faults
                .iter()
                .any(|entry| entry.starts_with("market data feed unavailable"))
        );
        assert_eq!(drain(&mut receivers.positions).len(), DEMO_CATALOG.len());
    }

    #[tokio::test]
    async fn test_connect_trading_failure_is_fatal() {
        let config = local_config(unreachable().await, serve(vec![]).await);
        let (mut client, _receivers) = MarketClient::new(config, Credentials::default());

        assert!(matches!(
            client.connect().await,
            Err(ClientError::TradingFeed(FeedError::Connect { .. }))
        ));
        assert!(client.market.is_none());
        assert!(client.trading.is_none());
    }

    #[tokio::test]
    async fn test_connect_demo_mode_merges_trading_tickers() {
        let ticker = r#"{"arg":{"channel":"tickers","instId":"SOL-USDT-SWAP"},"data":[{"instId":"SOL-USDT-SWAP","last":"160","ts":"1700000000000"}]}"#;
        let config = local_config(
            serve(vec![ticker.to_string()]).await,
            serve(vec![]).await,
        );
        let (mut client, mut receivers) = MarketClient::new(config, Credentials::default());

        client.connect().await.unwrap();
        assert_eq!(client.mode(), Some(ClientMode::Demo));

        let seeded = drain(&mut receivers.positions);
        assert_eq!(seeded.len(), DEMO_CATALOG.len());
        assert!(
            seeded
                .iter()
                .all(|update| matches!(update, PositionUpdate::Snapshot(_)))
        );

        let balance = receivers.balances.try_recv().unwrap();
        assert_eq!(balance.currency, crate::demo::DEMO_CURRENCY);

        tokio::spawn(client.start_listening());

        let update = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            receivers.positions.recv(),
        )
        .await
        .unwrap()
        .unwrap();

        let PositionUpdate::Snapshot(merged) = update else {
            panic!("expected merged demo snapshot, got {update:?}");
        };
        assert_eq!(merged.instrument_id, "SOL-USDT-SWAP");
        assert_eq!(
            (merged.current_price, merged.unrealized_pnl),
            (160.0, 500.0)
        );
    }
}
