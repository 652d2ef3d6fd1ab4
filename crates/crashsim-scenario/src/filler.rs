//! Background traffic emitted ahead of the scenario lines
//!
//! A fixed twelve-step rotation of storefront traffic. Identifiers come from
//! the scenario context so filler and scenario lines agree on who the user is.

use crashsim_model::{LogLevel, ScenarioContext};
use rand::Rng;

const PAGES: [&str; 5] = ["/", "/products", "/products/price", "/cart", "/checkout"];
const SKUS: [&str; 3] = ["SKU-001", "SKU-002", "SKU-003"];
const ROTATION: usize = 12;

/// One rendered filler line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillerLine {
    pub service: &'static str,
    pub level: LogLevel,
    pub message: String,
}

/// Context-derived identifiers shared by every filler line of a run
#[derive(Debug, Clone)]
pub struct Filler<'a> {
    session_id: &'a str,
    user_id: &'a str,
    cart_id: &'a str,
    request_id_prefix: &'a str,
}

impl<'a> Filler<'a> {
    #[must_use]
    pub fn new(context: &'a ScenarioContext) -> Self {
        Self {
            session_id: context.get("session_id").unwrap_or("sess_abc123"),
            user_id: context.get("user_id").unwrap_or("42"),
            cart_id: context.get("cart_id").unwrap_or("cart_77"),
            request_id_prefix: context.get("request_id_prefix").unwrap_or("req_pre_"),
        }
    }

    /// Filler line number `i` of the run
    pub fn line<R: Rng + ?Sized>(&self, i: usize, rng: &mut R) -> FillerLine {
        use LogLevel::{Debug, Info};

        let page = PAGES[i % PAGES.len()];
        let sku = SKUS[i % SKUS.len()];
        let rid = format!("{}{i:03}", self.request_id_prefix);
        let (session, user, cart) = (self.session_id, self.user_id, self.cart_id);

        let (service, level, message) = match i % ROTATION {
            0 => ("FRONTEND", Info, format!("page_load path={page} build=prod session_id={session}")),
            1 => ("FRONTEND", Debug, format!("api_request method=GET url=/products page={page} request_id={rid}")),
            2 => ("BACKEND", Info, format!("request_in method=GET path=/products request_id={rid}")),
            3 => ("DB", Debug, format!("query=SELECT products ORDER BY price limit=20 request_id={rid}")),
            4 => ("BACKEND", Info, format!("response_out status=200 path=/products request_id={rid}")),
            5 => ("FRONTEND", Info, format!("click action=add_to_cart sku={sku} user_id={user}")),
            6 => ("BACKEND", Info, format!("request_in method=POST path=/cart/add user_id={user} request_id={rid}")),
            7 => ("DB", Debug, format!("insert cart_id={cart} sku={sku} qty=1 request_id={rid}")),
            8 => ("TASKQ", Info, format!("enqueue job=add_order_items candidate_order_id=NA cart_id={cart}")),
            9 => ("ALB", Info, format!("forward_request target_group=ecom-backend listener=443 rule={page} request_id={rid}")),
            10 => {
                let latency: u32 = rng.gen_range(20..=180);
                ("CLOUDWATCH", Debug, format!("metrics request_latency_ms={latency} path={page}"))
            }
            _ => ("SECURITY", Info, format!("cors_check origin=https://app.example.com result=allowed request_id={rid}")),
        };

        FillerLine {
            service,
            level,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rotation_cycles_every_twelve_lines() {
        let ctx = ScenarioContext::empty();
        let filler = Filler::new(&ctx);
        let mut rng = StdRng::seed_from_u64(7);
        let services: Vec<_> = (0..24).map(|i| filler.line(i, &mut rng).service).collect();
        assert_eq!(services[..12], services[12..]);
        assert_eq!(services[0], "FRONTEND");
        assert_eq!(services[10], "CLOUDWATCH");
        assert_eq!(services[11], "SECURITY");
    }

    #[test]
    fn context_identifiers_flow_into_lines() {
        let ctx = ScenarioContext::empty()
            .with("session_id", "sess_vendor_7")
            .with("user_id", "7")
            .with("request_id_prefix", "req_mig_");
        let filler = Filler::new(&ctx);
        let mut rng = StdRng::seed_from_u64(1);

        assert!(filler.line(0, &mut rng).message.ends_with("session_id=sess_vendor_7"));
        assert!(filler.line(2, &mut rng).message.ends_with("request_id=req_mig_002"));
        assert!(filler.line(5, &mut rng).message.contains("user_id=7"));
        assert!(filler.line(7, &mut rng).message.contains("cart_id=cart_77"));
    }

    #[test]
    fn latency_comes_from_the_injected_rng() {
        let ctx = ScenarioContext::empty();
        let filler = Filler::new(&ctx);
        let a = filler.line(10, &mut StdRng::seed_from_u64(99));
        let b = filler.line(10, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
