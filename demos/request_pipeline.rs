use async_trait::async_trait;
use crinkle::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
struct Order {
    items: Vec<(String, u32)>,
    total_cents: u32,
    status: Option<&'static str>,
}

type OrderContext = Context<Order, HashMap<String, String>>;

define_processor!(PriceLookup);

#[async_trait]
impl AsyncProcessor<Order, HashMap<String, String>> for PriceLookup {
    async fn process(&self, ctx: &mut OrderContext) -> FlowResult<bool> {
        // Stand-in for a pricing service call.
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.state.total_cents = ctx
            .state
            .items
            .iter()
            .map(|(_, quantity)| quantity * 499)
            .sum();
        Ok(false)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut flow: Flow<Order, HashMap<String, String>> = Flow::new("Checkout");

    flow.processor("Reject empty cart").ordinary(|ctx| {
        if ctx.state.items.is_empty() {
            ctx.state.status = Some("empty");
            return Ok(true);
        }
        Ok(false)
    });
    flow.add_processor(Processor::suspending(Timeout::new(
        PriceLookup,
        Duration::from_secs(1),
    )));
    flow.processor("Apply coupon").ordinary(|ctx| {
        if ctx.additional_data().and_then(|d| d.get("coupon")).is_some() {
            ctx.state.total_cents = ctx.state.total_cents * 9 / 10;
        }
        Ok(false)
    });
    flow.processor("Confirm").ordinary(|ctx| {
        ctx.state.status = Some("confirmed");
        Ok(true)
    });

    let carts = [
        (Vec::new(), None),
        (
            vec![("book".to_string(), 2), ("pen".to_string(), 1)],
            Some(HashMap::from([("coupon".to_string(), "SPRING".to_string())])),
        ),
    ];

    for (items, extras) in carts {
        let mut ctx = Context::new(
            Order {
                items,
                ..Order::default()
            },
            extras,
        );
        flow.execute(&mut ctx)?;
        println!(
            "stopped at '{}': status={:?} total={}c",
            flow.get_current_processor(),
            ctx.state.status,
            ctx.state.total_cents
        );
    }

    Ok(())
}
