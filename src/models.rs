//! Shared data model: market snapshots, position requests, fills and signals.

use serde::{Deserialize, Serialize};

/// Snapshot kinds held by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Quote,
    Chain,
    OrderBook,
    Fill,
    Proof,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Chain => "chain",
            Self::OrderBook => "order_book",
            Self::Fill => "fill",
            Self::Proof => "proof",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quote" => Some(Self::Quote),
            "chain" => Some(Self::Chain),
            "order_book" => Some(Self::OrderBook),
            "fill" => Some(Self::Fill),
            "proof" => Some(Self::Proof),
            _ => None,
        }
    }
}

/// Top-of-book quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub bid_size: f64,
    #[serde(default)]
    pub ask_size: f64,
    /// Venue-reported time (ms).
    pub ts_feed: i64,
    /// Ingestion time (ms).
    pub ts_recv: i64,
    #[serde(default)]
    pub source: String,
}

impl Quote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Spread as a fraction of mid.
    pub fn spread_pct(&self) -> f64 {
        let mid = self.mid();
        if mid > 0.0 {
            (self.ask - self.bid).max(0.0) / mid
        } else {
            f64::INFINITY
        }
    }
}

/// One strike row of an option chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
    pub strike: f64,
    pub kind: OptionKind,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub open_interest: f64,
}

/// Option chain snapshot for one expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: String,
    pub underlying_price: f64,
    pub days_to_expiry: u32,
    pub rows: Vec<ChainRow>,
    pub ts_feed: i64,
    pub ts_recv: i64,
    #[serde(default)]
    pub source: String,
}

/// Price level on one side of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Depth snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    /// Best first.
    pub bids: Vec<BookLevel>,
    /// Best first.
    pub asks: Vec<BookLevel>,
    pub ts_feed: i64,
    pub ts_recv: i64,
    #[serde(default)]
    pub source: String,
}

impl OrderBook {
    pub fn mid(&self) -> Option<f64> {
        let bid = self.bids.first()?.price;
        let ask = self.asks.first()?.price;
        if bid <= 0.0 || ask <= 0.0 || ask < bid {
            return None;
        }
        Some((bid + ask) / 2.0)
    }
}

/// A recorded market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MarketSnapshot {
    Quote(Quote),
    Chain(OptionChain),
    OrderBook(OrderBook),
}

impl MarketSnapshot {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Quote(q) => &q.symbol,
            Self::Chain(c) => &c.symbol,
            Self::OrderBook(b) => &b.symbol,
        }
    }

    pub fn kind(&self) -> SnapshotKind {
        match self {
            Self::Quote(_) => SnapshotKind::Quote,
            Self::Chain(_) => SnapshotKind::Chain,
            Self::OrderBook(_) => SnapshotKind::OrderBook,
        }
    }

    pub fn ts_feed(&self) -> i64 {
        match self {
            Self::Quote(q) => q.ts_feed,
            Self::Chain(c) => c.ts_feed,
            Self::OrderBook(b) => b.ts_feed,
        }
    }

    pub fn ts_recv(&self) -> i64 {
        match self {
            Self::Quote(q) => q.ts_recv,
            Self::Chain(c) => c.ts_recv,
            Self::OrderBook(b) => b.ts_recv,
        }
    }
}

// =============================================================================
// POSITION REQUEST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegSide {
    Long,
    Short,
}

/// Structure kinds a caller may request. Only the debit subset is tradable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    LongCall,
    LongPut,
    DebitVertical,
    Diagonal,
    CreditVertical,
    ShortCall,
    ShortPut,
    ShortStraddle,
    ShortStrangle,
    IronCondor,
    CoveredCall,
}

impl StructureKind {
    pub const ALLOWED: [StructureKind; 4] = [
        StructureKind::LongCall,
        StructureKind::LongPut,
        StructureKind::DebitVertical,
        StructureKind::Diagonal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongCall => "long_call",
            Self::LongPut => "long_put",
            Self::DebitVertical => "debit_vertical",
            Self::Diagonal => "diagonal",
            Self::CreditVertical => "credit_vertical",
            Self::ShortCall => "short_call",
            Self::ShortPut => "short_put",
            Self::ShortStraddle => "short_straddle",
            Self::ShortStrangle => "short_strangle",
            Self::IronCondor => "iron_condor",
            Self::CoveredCall => "covered_call",
        }
    }

    pub fn is_allowed(&self) -> bool {
        Self::ALLOWED.contains(self)
    }

    /// Collects premium at entry (net credit).
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::CreditVertical
                | Self::ShortCall
                | Self::ShortPut
                | Self::ShortStraddle
                | Self::ShortStrangle
                | Self::IronCondor
                | Self::CoveredCall
        )
    }

    /// Net short option exposure (naked or premium-selling).
    pub fn is_short_premium(&self) -> bool {
        self.is_credit()
    }

    pub fn leg_count(&self) -> u32 {
        match self {
            Self::LongCall | Self::LongPut | Self::ShortCall | Self::ShortPut => 1,
            Self::CoveredCall => 1,
            Self::DebitVertical
            | Self::Diagonal
            | Self::CreditVertical
            | Self::ShortStraddle
            | Self::ShortStrangle => 2,
            Self::IronCondor => 4,
        }
    }
}

/// Directional lean of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Bias {
    pub fn sign(&self) -> i8 {
        match self {
            Self::Bullish => 1,
            Self::Bearish => -1,
            Self::Neutral => 0,
        }
    }
}

/// One option leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub kind: OptionKind,
    pub side: LegSide,
    pub strike: f64,
    pub days_to_expiry: u32,
}

impl OptionLeg {
    pub fn is_itm(&self, underlying: f64) -> bool {
        match self.kind {
            OptionKind::Call => underlying > self.strike,
            OptionKind::Put => underlying < self.strike,
        }
    }
}

/// Position or per-contract Greeks.
///
/// Delta and gamma are in share-equivalents (0.30 delta on a 100-share
/// contract is 30.0), theta is dollars per day and vega is dollars per
/// implied-volatility point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

impl Greeks {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
        }
    }
}

/// Chain liquidity scores in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainQuality {
    pub overall: f64,
    pub spread_score: f64,
    pub volume_score: f64,
    pub oi_score: f64,
}

impl ChainQuality {
    /// Derive scores from a chain snapshot.
    pub fn from_chain(chain: &OptionChain) -> Self {
        if chain.rows.is_empty() {
            return Self {
                overall: 0.0,
                spread_score: 0.0,
                volume_score: 0.0,
                oi_score: 0.0,
            };
        }

        let n = chain.rows.len() as f64;
        let spread_score = chain
            .rows
            .iter()
            .map(|r| {
                let mid = (r.bid + r.ask) / 2.0;
                if mid <= 0.0 {
                    return 0.0;
                }
                let rel = (r.ask - r.bid).max(0.0) / mid;
                // 0% spread -> 1.0, 20%+ spread -> 0.0
                (1.0 - rel / 0.20).clamp(0.0, 1.0)
            })
            .sum::<f64>()
            / n;
        let volume_score = chain
            .rows
            .iter()
            .map(|r| (r.volume / 500.0).min(1.0))
            .sum::<f64>()
            / n;
        let oi_score = chain
            .rows
            .iter()
            .map(|r| (r.open_interest / 1_000.0).min(1.0))
            .sum::<f64>()
            / n;

        let overall = 0.4 * spread_score + 0.3 * volume_score + 0.3 * oi_score;
        Self {
            overall,
            spread_score,
            volume_score,
            oi_score,
        }
    }
}

fn default_underlying_price() -> f64 {
    100.0
}
fn default_spread_pct() -> f64 {
    0.05
}
fn default_max_friction_pct() -> f64 {
    0.20
}

/// A pre-trade sizing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub symbol: String,
    pub structure: StructureKind,
    #[serde(default)]
    pub bias: Bias,
    #[serde(default)]
    pub legs: Vec<OptionLeg>,
    pub capital: f64,
    pub conviction: f64,
    pub expected_move: f64,
    pub iv_rank: f64,
    #[serde(default)]
    pub chain_quality: Option<ChainQuality>,
    /// Age of the NBBO quote the request was built from (ms).
    #[serde(default)]
    pub quote_age_ms: Option<i64>,
    #[serde(default = "default_underlying_price")]
    pub underlying_price: f64,
    /// Bid/ask spread of the structure as a fraction of its premium.
    #[serde(default = "default_spread_pct")]
    pub spread_pct: f64,
    #[serde(default)]
    pub leveraged_etf: bool,
    /// Caller's friction budget (cost / premium).
    #[serde(default = "default_max_friction_pct")]
    pub max_friction_pct: f64,
    /// Days until the next ex-dividend date, if one is scheduled.
    #[serde(default)]
    pub days_to_ex_dividend: Option<u32>,
    /// Live event signals for this symbol.
    #[serde(default)]
    pub event_signals: Vec<EventSignal>,
}

impl PositionRequest {
    /// Directional lean, implied by the structure when it has one.
    pub fn effective_bias(&self) -> Bias {
        match self.structure {
            StructureKind::LongCall => Bias::Bullish,
            StructureKind::LongPut => Bias::Bearish,
            _ => self.bias,
        }
    }
}

// =============================================================================
// POOL STATUS
// =============================================================================

/// Capital pool state at the time of a sizing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub pool_equity: f64,
    pub available_cash: f64,
    /// Options exposure already committed (dollars).
    pub options_used: f64,
    /// Trailing day P&L as a fraction of pool equity.
    #[serde(default)]
    pub day_pnl_pct: f64,
    /// Per trading day, oldest first: was the theta budget exceeded.
    #[serde(default)]
    pub theta_breach_history: Vec<bool>,
}

impl PoolStatus {
    pub fn new(pool_equity: f64, available_cash: f64, options_used: f64) -> Self {
        Self {
            pool_equity,
            available_cash,
            options_used,
            day_pnl_pct: 0.0,
            theta_breach_history: Vec::new(),
        }
    }

    pub fn options_used_pct(&self) -> f64 {
        if self.pool_equity > 0.0 {
            self.options_used / self.pool_equity
        } else {
            f64::INFINITY
        }
    }
}

// =============================================================================
// POST-TRADE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Options,
    Crypto,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Options => "options",
            Self::Crypto => "crypto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// What the pre-trade gate promised for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreTradePromise {
    pub trade_id: String,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: Side,
    /// Reference price used at sizing time.
    pub reference_price: f64,
    pub planned_max_slippage_pct: f64,
    /// Promised net debit per unit (positive = paid).
    pub promised_net_debit: f64,
    /// Promised total cost including fees.
    pub promised_total_cost: f64,
    pub quantity: f64,
    /// Units per quantity (100 for equity options, 1 for crypto).
    pub multiplier: f64,
    pub cash_before: f64,
    pub pool_equity: f64,
}

/// Broker/venue fill report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub trade_id: String,
    pub symbol: String,
    pub side: Side,
    /// Average fill price per unit (net for multi-leg structures).
    pub price: f64,
    pub quantity: f64,
    pub fees: f64,
    pub timestamp: i64,
    /// Filled fraction of the requested quantity.
    pub fill_pct: f64,
    /// Slippage reported by the venue, fraction of reference price.
    pub actual_slippage_pct: f64,
    #[serde(default)]
    pub order_book: Option<OrderBook>,
}

// =============================================================================
// EVENT SIGNALS
// =============================================================================

/// Sector tags used by rules and reaction statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Broad,
    Technology,
    Healthcare,
    Financials,
    Energy,
    Consumer,
    Industrials,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Broad => "broad",
            Self::Technology => "technology",
            Self::Healthcare => "healthcare",
            Self::Financials => "financials",
            Self::Energy => "energy",
            Self::Consumer => "consumer",
            Self::Industrials => "industrials",
        }
    }
}

/// Closed event taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "earnings.surprise.up")]
    EarningsSurpriseUp,
    #[serde(rename = "earnings.surprise.down")]
    EarningsSurpriseDown,
    #[serde(rename = "guidance.raised")]
    GuidanceRaised,
    #[serde(rename = "guidance.cut")]
    GuidanceCut,
    #[serde(rename = "analyst.upgrade")]
    AnalystUpgrade,
    #[serde(rename = "analyst.downgrade")]
    AnalystDowngrade,
    #[serde(rename = "ma.acquisition")]
    Acquisition,
    #[serde(rename = "regulatory.approval")]
    RegulatoryApproval,
    #[serde(rename = "regulatory.rejection")]
    RegulatoryRejection,
    #[serde(rename = "regulatory.investigation")]
    RegulatoryInvestigation,
    #[serde(rename = "capital.buyback")]
    Buyback,
    #[serde(rename = "capital.dividend.raise")]
    DividendRaise,
    #[serde(rename = "capital.dividend.cut")]
    DividendCut,
    #[serde(rename = "capital.offering")]
    StockOffering,
    #[serde(rename = "management.departure")]
    ExecutiveDeparture,
    #[serde(rename = "credit.bankruptcy")]
    Bankruptcy,
    #[serde(rename = "operations.recall")]
    ProductRecall,
    #[serde(rename = "operations.breach")]
    SecurityBreach,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EarningsSurpriseUp => "earnings.surprise.up",
            Self::EarningsSurpriseDown => "earnings.surprise.down",
            Self::GuidanceRaised => "guidance.raised",
            Self::GuidanceCut => "guidance.cut",
            Self::AnalystUpgrade => "analyst.upgrade",
            Self::AnalystDowngrade => "analyst.downgrade",
            Self::Acquisition => "ma.acquisition",
            Self::RegulatoryApproval => "regulatory.approval",
            Self::RegulatoryRejection => "regulatory.rejection",
            Self::RegulatoryInvestigation => "regulatory.investigation",
            Self::Buyback => "capital.buyback",
            Self::DividendRaise => "capital.dividend.raise",
            Self::DividendCut => "capital.dividend.cut",
            Self::StockOffering => "capital.offering",
            Self::ExecutiveDeparture => "management.departure",
            Self::Bankruptcy => "credit.bankruptcy",
            Self::ProductRecall => "operations.recall",
            Self::SecurityBreach => "operations.breach",
        }
    }
}

/// A classified, scored news event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSignal {
    pub event_type: EventType,
    /// +1 bullish, -1 bearish.
    pub direction: i8,
    pub confidence: f64,
    pub tickers: Vec<String>,
    pub sector_focus: Sector,
    pub source: String,
    pub timestamp: i64,
    pub match_strength: f64,
    /// Set only when validated reaction statistics back this event type.
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub effect_z: Option<f64>,
}

impl EventSignal {
    pub fn mentions(&self, symbol: &str) -> bool {
        self.tickers.iter().any(|t| t.eq_ignore_ascii_case(symbol))
    }
}
