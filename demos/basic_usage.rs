//! Basic usage example of the wiring layer.
//!
//! Wraps a method the way a caching decorator would: the real call and a key
//! builder are attached as behaviors, and every instance gets its own wire.

use serde_json::{json, Value};
use wire_kit::{
    call::func, error::Result, Behavior, CallableWrapper, Class, Instance, Kwargs, Parameter,
    Signature, Wire,
};

/// Example receiver: a user record.
struct User {
    id: String,
    name: String,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Wire Kit - Basic Example ===\n");

    // 1. Declare `User.greet(self, greeting, punctuation="!")`
    println!("1. Wrapping User.greet...");
    let user_class = Class::new("User");
    let sig = Signature::new(vec![
        Parameter::positional("self"),
        Parameter::positional("greeting"),
        Parameter::positional("punctuation").with_default(json!("!")),
    ])?;
    let greet = CallableWrapper::method(
        "greet",
        sig,
        func(|call| {
            let name = call.instance::<User>().map(|u| u.name.as_str()).unwrap_or("?");
            let greeting = call.arg(0, "greeting").and_then(Value::as_str).unwrap_or("Hello");
            let punctuation = call.arg(1, "punctuation").and_then(Value::as_str).unwrap_or("!");
            Ok(json!(format!("{}, {}{}", greeting, name, punctuation)))
        }),
    )?;
    let property = Wire::for_callable(greet.clone()).into_property()?;
    println!("   ✓ Property ready\n");

    // 2. Attach behaviors the decorator needs
    println!("2. Attaching 'call' and 'key' behaviors...");
    property.attach("call", Behavior::callable(move |call| greet.invoke(call)));
    property.attach(
        "key",
        Behavior::callable(|call| {
            let id = call.instance::<User>().map(|u| u.id.as_str()).unwrap_or("");
            Ok(json!(format!("user:{}:greet", id)))
        }),
    );
    println!("   ✓ Behaviors: {:?}\n", property.registry().names());

    // 3. Use it through two instances
    println!("3. Calling through two users:");
    let alice = Instance::new(
        &user_class,
        User {
            id: "u1".to_string(),
            name: "Alice".to_string(),
        },
    );
    let bob = Instance::new(
        &user_class,
        User {
            id: "u2".to_string(),
            name: "Bob".to_string(),
        },
    );

    for user in [&alice, &bob] {
        let wire = property.get_for(user);
        let result = wire.invoke("call", vec![json!("Hi")], Kwargs::new())?;
        let key = wire.invoke("key", vec![], Kwargs::new())?;
        let merged = wire.merge_args(&[json!("Hi")], &Kwargs::new())?;
        let id = user.downcast_ref::<User>().map(|u| u.id.as_str()).unwrap_or("?");
        println!("   {} -> {} (key {}, args {})", id, result, key, Value::Object(merged));
    }

    println!("\n   ✓ {} wire(s) stored\n", property.len());
    Ok(())
}
