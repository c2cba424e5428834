//! Toy price/time-priority order matching loop, instrumented with `latte`.
//!
//! Exercises `Start`/`Stop` around the two book-side operations that
//! dominate a matching engine's tick and a `Pulse` around the tick boundary
//! itself, then prints a calibrated report.

use std::collections::BTreeMap;

use latte::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Order {
    price: u64,
    qty: u64,
}

/// A minimal price-level book: bids keyed high-to-low, asks low-to-high.
/// Not a realistic matching engine — it exists to give the instrumentation
/// points below something plausible to wrap.
#[derive(Default)]
struct Book {
    bids: BTreeMap<std::cmp::Reverse<u64>, Vec<Order>>,
    asks: BTreeMap<u64, Vec<Order>>,
}

impl Book {
    fn insert_bid(&mut self, order: Order) {
        self.bids
            .entry(std::cmp::Reverse(order.price))
            .or_default()
            .push(order);
    }

    fn insert_ask(&mut self, order: Order) {
        self.asks.entry(order.price).or_default().push(order);
    }

    /// Match the best bid against the best ask while they cross, returning
    /// the number of trades produced.
    fn match_tick(&mut self) -> usize {
        let mut trades = 0;
        loop {
            let Some((&std::cmp::Reverse(best_bid), _)) = self.bids.iter().next() else {
                break;
            };
            let Some((&best_ask, _)) = self.asks.iter().next() else {
                break;
            };
            if best_bid < best_ask {
                break;
            }

            let bid_level = self.bids.get_mut(&std::cmp::Reverse(best_bid)).unwrap();
            let ask_level = self.asks.get_mut(&best_ask).unwrap();
            let bid = bid_level.first_mut().unwrap();
            let ask = ask_level.first_mut().unwrap();
            let filled = bid.qty.min(ask.qty);
            bid.qty -= filled;
            ask.qty -= filled;
            if bid.qty == 0 {
                bid_level.remove(0);
            }
            if ask.qty == 0 {
                ask_level.remove(0);
            }
            if bid_level.is_empty() {
                self.bids.remove(&std::cmp::Reverse(best_bid));
            }
            if ask_level.is_empty() {
                self.asks.remove(&best_ask);
            }
            trades += 1;
        }
        trades
    }
}

const INSERT_SITE: &str = "matching-engine::insert";
const MATCH_SITE: &str = "matching-engine::match_tick";
const TICK_SITE: &str = "matching-engine::tick";

/// A cheap deterministic pseudo-random stream so the demo needs no
/// external `rand` dependency for what is just synthetic order flow.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.0 >> 33
    }
}

fn main() {
    const TICKS: u64 = 200_000;
    const ORDERS_PER_TICK: u64 = 4;

    let mut book = Book::default();
    let mut rng = Lcg(0x5EED);
    let mut total_trades = 0usize;

    for _ in 0..TICKS {
        Pulse(id!(TICK_SITE));

        Hard::start(id!(MATCH_SITE));
        for _ in 0..ORDERS_PER_TICK {
            let price = 10_000 + (rng.next() % 40);
            let qty = 1 + (rng.next() % 25);
            let order = Order { price, qty };

            Fast::start(id!(INSERT_SITE));
            if rng.next() % 2 == 0 {
                book.insert_bid(order);
            } else {
                book.insert_ask(order);
            }
            Fast::stop(id!(INSERT_SITE));
        }
        total_trades += book.match_tick();
        Hard::stop(id!(MATCH_SITE));
    }

    println!("{TICKS} ticks, {total_trades} trades");

    Calibrate();
    let mut out = std::io::stdout().lock();
    DumpToStream(&mut out, Unit::Time, DataMode::Calibrated)
        .expect("report write to stdout should not fail");
}
