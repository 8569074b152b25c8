#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

// End-to-end protocols run at every participant over the in-process bus.

mod common;

use async_trait::async_trait;
use common::{deploy, recorded, recorder, Recorder, Role};
use locus_choreography::{
    choreography, Choreo, Choreography, ChoreographyError, LocalBus, Located, Metrics, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::{Date, Month};

use Role::{Alice, Bob, Carol};

#[tokio::test]
async fn hello() {
    let seen = recorder();
    let sink = seen.clone();
    let hello = choreography(move |op: Choreo<Role>, (): ()| {
        let sink = sink.clone();
        async move {
            let msg = op.locally(Alice, |_| Ok(String::from("hello, world")))?;
            let msg = op.comm(Alice, Bob, &msg).await?;
            op.locally(Bob, |un| {
                sink.lock().unwrap().push(un.get(&msg)?.clone());
                Ok(())
            })?;
            Ok(())
        }
    });

    for result in deploy(&[Alice, Bob], &hello).await {
        result.unwrap();
    }
    assert_eq!(recorded(&seen), vec!["hello, world".to_string()]);
}

#[tokio::test]
async fn decision_broadcast() {
    let seen = recorder();
    let sink = seen.clone();
    let decide = choreography(move |op: Choreo<Role>, (): ()| {
        let sink = sink.clone();
        async move {
            let decision = op.locally(Alice, |_| Ok(21 * 2 == 42))?;
            let decision = op.broadcast(Alice, &decision).await?;
            sink.lock().unwrap().push((op.location(), decision));
            Ok(())
        }
    });

    for result in deploy(&[Alice, Bob, Carol], &decide).await {
        result.unwrap();
    }
    assert_eq!(
        recorded(&seen),
        vec![(Alice, true), (Bob, true), (Carol, true)]
    );
}

/// Buyer asks for a title; seller quotes it; buyer decides against its budget
/// and everyone learns the decision; an accepted order yields a delivery date.
struct Bookseller {
    title: String,
    budget: u32,
    catalog: HashMap<String, u32>,
    delivery: Date,
    outcome: Recorder<Option<Date>>,
}

impl Bookseller {
    fn new(title: &str, outcome: Recorder<Option<Date>>) -> Self {
        Bookseller {
            title: title.into(),
            budget: 100,
            catalog: HashMap::from([
                ("TAPL".to_string(), 80),
                ("HoTT".to_string(), 120),
            ]),
            delivery: Date::from_calendar_date(2026, Month::December, 24).unwrap(),
            outcome,
        }
    }
}

const BUYER: Role = Alice;
const SELLER: Role = Bob;

#[async_trait]
impl Choreography<Role> for Bookseller {
    type Args = ();
    type Output = Located<Option<Date>, Role>;

    async fn run(&self, op: Choreo<Role>, _args: ()) -> Result<Self::Output> {
        let title = op.locally(BUYER, |_| Ok(self.title.clone()))?;
        let title = op.comm(BUYER, SELLER, &title).await?;

        let price = op.locally(SELLER, |un| {
            Ok(self
                .catalog
                .get(un.get(&title)?)
                .copied()
                .unwrap_or(u32::MAX))
        })?;
        let price = op.comm(SELLER, BUYER, &price).await?;

        let decision = op.locally(BUYER, |un| Ok(*un.get(&price)? <= self.budget))?;
        let decision = op.broadcast(BUYER, &decision).await?;

        let delivery = if decision {
            let date = op.locally(SELLER, |_| Ok(Some(self.delivery)))?;
            op.comm(SELLER, BUYER, &date).await?
        } else {
            op.locally(BUYER, |_| Ok(None))?
        };

        op.locally(BUYER, |un| {
            self.outcome.lock().unwrap().push(*un.get(&delivery)?);
            Ok(())
        })?;
        Ok(delivery)
    }
}

#[tokio::test]
async fn bookseller_affordable() {
    let outcome = recorder();
    let results = deploy(&[BUYER, SELLER], &Bookseller::new("TAPL", outcome.clone())).await;
    for result in results {
        result.unwrap();
    }
    let expected = Date::from_calendar_date(2026, Month::December, 24).unwrap();
    assert_eq!(*outcome.lock().unwrap(), vec![Some(expected)]);
}

#[tokio::test]
async fn bookseller_unaffordable() {
    let outcome = recorder();
    for title in ["HoTT", "Missing Title"] {
        let results = deploy(&[BUYER, SELLER], &Bookseller::new(title, outcome.clone())).await;
        for result in results {
            result.unwrap();
        }
    }
    assert_eq!(*outcome.lock().unwrap(), vec![None, None]);
}

#[tokio::test]
async fn outer_operator_inside_scope_is_rejected() {
    let chor = choreography(|op: Choreo<Role>, (): ()| async move {
        let outer = op.clone();
        let inner = choreography(move |inner: Choreo<Role>, (): ()| {
            let outer = outer.clone();
            async move {
                let secret = inner.locally(Alice, |_| Ok(7u32))?;
                let secret = inner.comm(Alice, Bob, &secret).await?;
                // The outer handle's scope is not the live one in here.
                outer.broadcast(Alice, &secret).await?;
                Ok(())
            }
        });
        op.colocally(&[Alice, Bob], &inner, ()).await?;
        op.locally(Carol, |_| Ok(()))?;
        Ok(())
    });

    let results = deploy(&[Alice, Bob, Carol], &chor).await;
    for result in &results[..2] {
        let err = result.as_ref().unwrap_err();
        assert!(matches!(err, ChoreographyError::ScopeViolation(_)), "{err}");
        assert!(err.is_fatal());
    }
    results[2].as_ref().unwrap();
}

#[tokio::test]
async fn leaked_inner_operator_is_rejected() {
    let chor = choreography(|op: Choreo<Role>, (): ()| async move {
        let inner = choreography(|inner: Choreo<Role>, (): ()| async move {
            let v = inner.locally(Alice, |_| Ok(1u8))?;
            inner.comm(Alice, Bob, &v).await?;
            Ok(Some(inner))
        });
        match op.colocally(&[Alice, Bob], &inner, ()).await? {
            Some(leaked) => {
                leaked.locally(Alice, |_| Ok(2u8))?;
            }
            None => {
                op.locally(Carol, |_| Ok(3u8))?;
            }
        }
        Ok(())
    });

    let results = deploy(&[Alice, Bob, Carol], &chor).await;
    assert!(matches!(results[0], Err(ChoreographyError::ScopeViolation(_))));
    assert!(matches!(results[1], Err(ChoreographyError::ScopeViolation(_))));
    assert!(results[2].is_ok());
}

#[tokio::test]
async fn scoped_operator_cannot_reach_outside_members() {
    let chor = choreography(|op: Choreo<Role>, (): ()| async move {
        let inner = choreography(|inner: Choreo<Role>, (): ()| async move {
            let v = inner.locally(Alice, |_| Ok(1u8))?;
            inner.comm(Alice, Carol, &v).await?;
            Ok(())
        });
        op.colocally(&[Alice, Bob], &inner, ()).await
    });

    let results = deploy(&[Alice, Bob, Carol], &chor).await;
    assert!(matches!(results[0], Err(ChoreographyError::ScopeViolation(_))));
    assert!(matches!(results[1], Err(ChoreographyError::ScopeViolation(_))));
    assert!(results[2].is_ok());
}

#[tokio::test]
async fn broadcast_reaches_only_the_active_scope() {
    let seen = recorder();
    let sink = seen.clone();
    let chor = choreography(move |op: Choreo<Role>, (): ()| {
        let sink = sink.clone();
        async move {
            let inner = choreography(|inner: Choreo<Role>, (): ()| async move {
                let v = inner.locally(Alice, |_| Ok(String::from("inner")))?;
                let v = inner.broadcast(Alice, &v).await?;
                inner.locally(inner.location(), |_| Ok(v))
            });
            let result = op.colocally(&[Alice, Bob], &inner, ()).await?;
            op.locally(op.location(), |un| {
                sink.lock()
                    .unwrap()
                    .push((op.location(), un.get(&result).ok().cloned()));
                Ok(())
            })?;
            Ok(())
        }
    });

    crate::common::init_tracing();
    let bus = LocalBus::new([Alice, Bob, Carol]);
    let carol = Arc::new(Metrics::new(bus.transport(Carol)));
    let (a, b, c) = futures::join!(
        locus_choreography::run(bus.transport(Alice), Alice, &chor, ()),
        locus_choreography::run(bus.transport(Bob), Bob, &chor, ()),
        locus_choreography::run(carol.clone(), Carol, &chor, ()),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(carol.recv_count(), 0);
    assert_eq!(bus.pending(Carol), 0);
    assert_eq!(
        recorded(&seen),
        vec![
            (Alice, Some("inner".to_string())),
            (Bob, Some("inner".to_string())),
            (Carol, None),
        ]
    );
}

/// One round trip whose sender dawdles before answering.
struct Delayed {
    delay: Duration,
    label: &'static str,
}

#[async_trait]
impl Choreography<Role> for Delayed {
    type Args = ();
    type Output = Located<String, Role>;

    async fn run(&self, op: Choreo<Role>, _args: ()) -> Result<Self::Output> {
        let delay = self.delay;
        let label = self.label;
        let v = op
            .locally_async(Alice, |_| async move {
                tokio::time::sleep(delay).await;
                Ok(label.to_string())
            })
            .await?;
        op.comm(Alice, Bob, &v).await
    }
}

#[tokio::test]
async fn concurrent_branches_do_not_cross_deliver() {
    let seen = recorder();
    let sink = seen.clone();
    let slow = Arc::new(Delayed {
        delay: Duration::from_millis(50),
        label: "slow",
    });
    let fast = Arc::new(Delayed {
        delay: Duration::ZERO,
        label: "fast",
    });
    let race = choreography(move |op: Choreo<Role>, (): ()| {
        let (sink, slow, fast) = (sink.clone(), slow.clone(), fast.clone());
        async move {
            let (first, second) =
                futures::try_join!(op.call(slow.as_ref(), ()), op.call(fast.as_ref(), ()))?;
            op.locally(Bob, |un| {
                sink.lock()
                    .unwrap()
                    .push((un.get(&first)?.clone(), un.get(&second)?.clone()));
                Ok(())
            })?;
            Ok(())
        }
    });

    for result in deploy(&[Alice, Bob], &race).await {
        result.unwrap();
    }
    assert_eq!(
        recorded(&seen),
        vec![("slow".to_string(), "fast".to_string())]
    );
}
