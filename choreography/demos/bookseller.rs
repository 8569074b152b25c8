// Demonstration of runtime endpoint projection
//
// The bookseller protocol is written once, from the global viewpoint, and run
// at both participants over the in-process bus. The `Trace` middleware logs
// every envelope; set RUST_LOG=debug to see them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::{Date, Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;

use locus_choreography::{run, Choreo, Choreography, LocalBus, Located, Result, Trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum Role {
    Buyer,
    Seller,
}

struct Bookseller {
    title: String,
    budget: u32,
    catalog: HashMap<String, u32>,
}

#[async_trait]
impl Choreography<Role> for Bookseller {
    type Args = ();
    type Output = Located<Option<Date>, Role>;

    async fn run(&self, op: Choreo<Role>, _args: ()) -> Result<Self::Output> {
        let title = op.locally(Role::Buyer, |_| {
            println!("Buyer: asking for {:?}", self.title);
            Ok(self.title.clone())
        })?;
        let title = op.comm(Role::Buyer, Role::Seller, &title).await?;

        let price = op.locally(Role::Seller, |un| {
            let title = un.get(&title)?;
            let price = self.catalog.get(title).copied().unwrap_or(u32::MAX);
            println!("Seller: {:?} costs {}", title, price);
            Ok(price)
        })?;
        let price = op.comm(Role::Seller, Role::Buyer, &price).await?;

        let decision = op.locally(Role::Buyer, |un| Ok(*un.get(&price)? <= self.budget))?;
        let decision = op.broadcast(Role::Buyer, &decision).await?;
        println!("{:?}: the order is {}", op.location(), if decision { "on" } else { "off" });

        if decision {
            let date = op.locally(Role::Seller, |_| {
                Ok(Some((OffsetDateTime::now_utc() + Duration::days(3)).date()))
            })?;
            op.comm(Role::Seller, Role::Buyer, &date).await
        } else {
            op.locally(Role::Buyer, |_| Ok(None))
        }
    }
}

async fn order(title: &str) -> Result<()> {
    let bookseller = Bookseller {
        title: title.to_string(),
        budget: 100,
        catalog: HashMap::from([
            ("Types and Programming Languages".to_string(), 80),
            ("Homotopy Type Theory".to_string(), 120),
        ]),
    };

    let bus = LocalBus::new([Role::Buyer, Role::Seller]);
    let (buyer, seller) = futures::join!(
        run(
            Trace::with_prefix(bus.transport(Role::Buyer), "buyer"),
            Role::Buyer,
            &bookseller,
            ()
        ),
        run(
            Trace::with_prefix(bus.transport(Role::Seller), "seller"),
            Role::Seller,
            &bookseller,
            ()
        ),
    );
    buyer?;
    seller?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    for title in [
        "Types and Programming Languages",
        "Homotopy Type Theory",
        "Not In The Catalog",
    ] {
        println!("=== {} ===", title);
        order(title).await?;
    }
    Ok(())
}
