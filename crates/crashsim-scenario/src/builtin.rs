//! The built-in scenario table

use crashsim_model::{
    LineTemplate, LogLevel, ScenarioContext, ScenarioDefinition, ScenarioKind, Severity,
};

/// Floor used by scenarios that do not override it
pub const DEFAULT_MIN_LOGS: usize = 120;

/// Every built-in scenario, in catalog order
pub(crate) fn definitions() -> Vec<ScenarioDefinition> {
    ScenarioKind::ALL.into_iter().map(definition).collect()
}

fn definition(kind: ScenarioKind) -> ScenarioDefinition {
    match kind {
        ScenarioKind::PaystackTimeout => paystack_timeout(),
        ScenarioKind::MigrationTypeMismatch => migration_type_mismatch(),
        ScenarioKind::TaskqOversell => taskq_oversell(),
        ScenarioKind::VerifyPaymentTimeout => verify_payment_timeout(),
        ScenarioKind::DbStartupFailure => db_startup_failure(),
        ScenarioKind::StripeSignatureError => stripe_signature_error(),
    }
}

fn line(service: &str, level: LogLevel, message: &str) -> LineTemplate {
    LineTemplate::new(service, level, message)
}

fn paystack_timeout() -> ScenarioDefinition {
    use LogLevel::{Debug, Error, Info};
    ScenarioDefinition {
        name: ScenarioKind::PaystackTimeout,
        title: "Payment Gateway Timeout - Checkout Process Failed".into(),
        description: "Paystack payment gateway connection timed out during checkout process. \
                      Users are unable to complete purchases, resulting in lost revenue and \
                      poor customer experience."
            .into(),
        severity: Severity::Critical,
        component: "PAYMENT_SERVICE".into(),
        error_type: "httpx.ConnectTimeout".into(),
        context: ScenarioContext::empty()
            .with("component", "BACKEND")
            .with("request_id", "req_001")
            .with("user_id", "42")
            .with("session_id", "sess_abc123")
            .with("request_id_prefix", "req_pyt_")
            .with("amount", "129900")
            .with("email", "jane@example.com"),
        log_template: vec![
            line("BACKEND", Info, "request_in method=POST path=/cart/checkout user_id={user_id} request_id={request_id}"),
            line("BACKEND", Debug, "route handler=api.endpoints.cart.checkout deps=get_cart_service,get_current_verified_customer"),
            line("BACKEND", Info, "service call services.cart_service.CartService.checkout customer_id={user_id}"),
            line("DB", Debug, "get_cart_summary customer_id={user_id} items=2 total_amount={amount}"),
            line("PAYMENTS", Info, "initializing_paystack amount={amount} channel=CARD email={email}"),
            line("PAYMENTS", Error, "paystack_initialize_timeout timeout_ms=2000"),
            line("DB", Debug, "rollback_tx reason=payment_timeout request_id={request_id}"),
            line("BACKEND", Info, "response_out status=502 path=/cart/checkout request_id={request_id}"),
        ],
        stack_trace_template: r#"Traceback (most recent call last):
  File "/app/backend/api/endpoints/cart.py", line 82, in checkout
    return await cart_service.checkout(data_obj, current_user)
  File "/app/backend/services/cart_service.py", line 130, in checkout
    return await self.paystack.initialize_payment(
  File "/app/backend/core/paystack.py", line 35, in initialize_payment
    rsp = await self.client.post(
  File "/usr/local/lib/python3.11/site-packages/httpx/_client.py", line 1778, in _send_single_request
    raise httpx.ConnectTimeout("Timed out while connecting to Paystack")
httpx.ConnectTimeout: Timed out while connecting to Paystack"#
            .into(),
        default_min_logs: DEFAULT_MIN_LOGS,
    }
}

fn migration_type_mismatch() -> ScenarioDefinition {
    use LogLevel::{Debug, Error, Info};
    ScenarioDefinition {
        name: ScenarioKind::MigrationTypeMismatch,
        title: "Database Migration Type Mismatch Error".into(),
        description: "Database migration 160dd810dc36 introduced a type mismatch in the price \
                      field. Vendor dashboard calculations are failing due to NoneType values \
                      in price calculations."
            .into(),
        severity: Severity::High,
        component: "DATABASE".into(),
        error_type: "TypeError".into(),
        context: ScenarioContext::empty()
            .with("component", "BACKEND")
            .with("request_id", "req_003")
            .with("user_id", "7")
            .with("session_id", "sess_vendor_7")
            .with("request_id_prefix", "req_mig_")
            .with("vendor_id", "7")
            .with("migration", "160dd810dc36"),
        log_template: vec![
            line("BACKEND", Info, "request_in method=GET path=/order/vendor/ vendor_id={vendor_id} request_id={request_id}"),
            line("BACKEND", Info, "service call services.order_service.OrderService.vendor_dashboard vendor_id={vendor_id}"),
            line("DB", Debug, "fetch order_items by vendor_id={vendor_id} count=12"),
            line("BACKEND", Error, "vendor_dashboard_failed reason=type_mismatch_in_price_field migration={migration}"),
            line("BACKEND", Info, "response_out status=500 path=/order/vendor/ request_id={request_id}"),
        ],
        stack_trace_template: r#"Traceback (most recent call last):
  File "/app/backend/api/endpoints/order.py", line 29, in vendor_dashboard
    return await order_service.vendor_dashboard(vendor_id=current_user.role_id)
  File "/app/backend/services/order_service.py", line 35, in vendor_dashboard
    total_sales = sum([item.price * item.quantity for item in order_items])
  File "/app/backend/services/order_service.py", line 35, in <listcomp>
    total_sales = sum([item.price * item.quantity for item in order_items])
TypeError: unsupported operand type(s) for *: 'NoneType' and 'int'"#
            .into(),
        default_min_logs: DEFAULT_MIN_LOGS,
    }
}

fn taskq_oversell() -> ScenarioDefinition {
    use LogLevel::{Debug, Error, Info, Warn};
    ScenarioDefinition {
        name: ScenarioKind::TaskqOversell,
        title: "Inventory Oversell Detection - Order Processing Failed".into(),
        description: "Task queue detected an oversell condition where requested quantity (2) \
                      exceeds available stock (1) for SKU-001. Order processing has been blocked \
                      to prevent inventory inconsistencies."
            .into(),
        severity: Severity::High,
        component: "INVENTORY_SERVICE".into(),
        error_type: "pydantic.error_wrappers.ValidationError".into(),
        context: ScenarioContext::empty()
            .with("component", "TASKQ")
            .with("job_id", "job_123")
            .with("session_id", "sess_abc123")
            .with("request_id_prefix", "req_tq_")
            .with("order_id", "123")
            .with("sku", "SKU-001"),
        log_template: vec![
            line("TASKQ", Info, "enqueue job=add_order_items order_id={order_id}"),
            line("TASKQ", Info, "execute task_queue.tasks.cart_tasks.add_order_items order_id={order_id}"),
            line("DB", Debug, "cart_summary customer_id=42 items=2"),
            line("TASKQ", Error, "add_order_items_failed reason=oversell_detected sku={sku} stock=1 requested=2"),
            line("TASKQ", Info, "execute task_queue.tasks.cart_tasks.update_stock_after_checkout order_id={order_id}"),
            line("DB", Debug, "order_items fetched count=0"),
            line("TASKQ", Warn, "no_order_items_to_update order_id={order_id}"),
        ],
        stack_trace_template: r#"Traceback (most recent call last):
  File "/app/backend/task_queue/tasks/cart_tasks.py", line 47, in add_order_items
    order_item = OrderItemsCreate(
  File "pydantic/main.py", line 341, in pydantic.main.BaseModel.__init__
    raise ValidationError(model='OrderItemsCreate', errors=[{'loc': ('quantity',), 'msg': 'oversell', 'type': 'value_error'}])
pydantic.error_wrappers.ValidationError: 1 validation error for OrderItemsCreate
quantity
  oversell (type=value_error)"#
            .into(),
        default_min_logs: DEFAULT_MIN_LOGS,
    }
}

fn verify_payment_timeout() -> ScenarioDefinition {
    use LogLevel::{Error, Info};
    ScenarioDefinition {
        name: ScenarioKind::VerifyPaymentTimeout,
        title: "Payment Verification Timeout".into(),
        description: "Payment verification with Paystack timed out while reading response. \
                      Order status remains uncertain, potentially causing duplicate charges or \
                      failed order confirmations."
            .into(),
        severity: Severity::High,
        component: "PAYMENT_SERVICE".into(),
        error_type: "httpx.ReadTimeout".into(),
        context: ScenarioContext::empty()
            .with("component", "BACKEND")
            .with("request_id", "req_004")
            .with("user_id", "42")
            .with("session_id", "sess_abc123")
            .with("request_id_prefix", "req_vfy_")
            .with("payment_ref", "REF_ABC"),
        log_template: vec![
            line("BACKEND", Info, "request_in method=GET path=/cart/verify-payment/{payment_ref} request_id={request_id}"),
            line("BACKEND", Info, "service call services.cart_service.CartService.verify_order_payment"),
            line("PAYMENTS", Info, "verify_paystack payment_ref={payment_ref}"),
            line("BACKEND", Error, "verify_payment_failed request_id={request_id} status=502"),
        ],
        stack_trace_template: r#"Traceback (most recent call last):
  File "/app/backend/services/cart_service.py", line 157, in verify_order_payment
    payment_rsp = await self.paystack.verify_payment(payment_ref=payment_ref)
  File "/app/backend/core/paystack.py", line 53, in verify_payment
    rsp = await self.client.get(url=f"transaction/verify/{payment_ref}")
  File "/usr/local/lib/python3.11/site-packages/httpx/_client.py", line 1734, in _send_single_request
    raise httpx.ReadTimeout("Timed out while reading from Paystack")
httpx.ReadTimeout: Timed out while reading from Paystack"#
            .into(),
        default_min_logs: DEFAULT_MIN_LOGS,
    }
}

fn db_startup_failure() -> ScenarioDefinition {
    use LogLevel::{Error, Info};
    ScenarioDefinition {
        name: ScenarioKind::DbStartupFailure,
        title: "Database Connection Failure - Service Startup Failed".into(),
        description: "Application failed to start due to database connection issues after 3 \
                      retry attempts. All database-dependent services are unavailable."
            .into(),
        severity: Severity::Critical,
        component: "DATABASE".into(),
        error_type: "core.errors.DatabaseConnectionError".into(),
        context: ScenarioContext::empty()
            .with("component", "BOOT")
            .with("session_id", "sess_boot")
            .with("request_id_prefix", "req_boot_")
            .with("max_retries", "3"),
        log_template: vec![
            line("BOOT", Info, "starting FastAPI app import=backend.main"),
            line("DB", Info, "core.middleware.start_up_db attempting connection retries=0/{max_retries}"),
            line("DB", Error, "Database connection failed (Attempts: 1/{max_retries})"),
            line("DB", Error, "Error: could not connect to server: Connection refused"),
            line("DB", Error, "Database connection failed (Attempts: 2/{max_retries})"),
            line("DB", Error, "Database connection failed (Attempts: 3/{max_retries})"),
            line("DB", Error, "Failed to establish database connection after {max_retries} attempts"),
        ],
        stack_trace_template: r#"Traceback (most recent call last):
  File "/app/backend/main.py", line 7, in <module>
    from core.middleware import start_up_db
  File "/app/backend/core/middleware.py", line 48, in start_up_db
    raise DatabaseConnectionError
core.errors.DatabaseConnectionError"#
            .into(),
        // a boot failure has little traffic in front of it
        default_min_logs: 60,
    }
}

fn stripe_signature_error() -> ScenarioDefinition {
    use LogLevel::{Error, Info};
    ScenarioDefinition {
        name: ScenarioKind::StripeSignatureError,
        title: "Stripe Signature Verification Failed".into(),
        description: "Stripe webhook signature verification failed, indicating potential \
                      security issue or configuration problem. Payment processing may be \
                      compromised."
            .into(),
        severity: Severity::High,
        component: "PAYMENT_SERVICE".into(),
        error_type: "stripe.error.SignatureVerificationError".into(),
        context: ScenarioContext::empty()
            .with("component", "PAYMENTS")
            .with("session_id", "sess_pay")
            .with("request_id_prefix", "req_stp_")
            .with("quantity", "2"),
        log_template: vec![
            line("PAYMENTS", Info, "stripe_checkout_session quantity={quantity}"),
            line("PAYMENTS", Error, "stripe_checkout_session_failed"),
        ],
        stack_trace_template: r#"Traceback (most recent call last):
  File "/app/backend/core/stripe_payment.py", line 11, in create_checkout_session
    session = stripe.checkout.Session.create(
  File "/usr/local/lib/python3.11/site-packages/stripe/api_resources/abstract/createable_api_resource.py", line 18, in create
    return super(CreateableAPIResource, cls).create(**params)
  File "/usr/local/lib/python3.11/site-packages/stripe/api_resources/abstract/api_resource.py", line 668, in create
    response, api_key = requestor.request("post", url, params, headers)
  File "/usr/local/lib/python3.11/site-packages/stripe/api_requestor.py", line 201, in request
    raise error.SignatureVerificationError("Invalid signature")
stripe.error.SignatureVerificationError: Invalid signature

During handling of the above exception, another exception occurred:

Traceback (most recent call last):
  File "/app/backend/core/stripe_payment.py", line 29, in create_checkout_session
    raise ValueError()
ValueError"#
            .into(),
        default_min_logs: DEFAULT_MIN_LOGS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template;

    #[test]
    fn every_builtin_passes_validation() {
        for def in definitions() {
            assert_eq!(template::validate(&def), Ok(()), "{}", def.name);
        }
    }

    #[test]
    fn table_covers_every_kind_in_order() {
        let names: Vec<_> = definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ScenarioKind::ALL.to_vec());
    }

    #[test]
    fn severities_match_catalog() {
        let defs = definitions();
        let critical: Vec<_> = defs
            .iter()
            .filter(|d| d.severity == Severity::Critical)
            .map(|d| d.name)
            .collect();
        assert_eq!(
            critical,
            vec![ScenarioKind::PaystackTimeout, ScenarioKind::DbStartupFailure]
        );
    }
}
