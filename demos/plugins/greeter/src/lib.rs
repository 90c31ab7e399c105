//! Invokable plugin. Declares itself on the first call and greets the
//! client on every call after that, including `run greeter`. Install it as
//! `greeter.so`; cargo's `libgreeter.so` would be `run libgreeter`.

use ember_sdk::{export_plugin, Channel, Registration};

fn entry(mut registration: Registration<'_>, mut channel: Channel<'_>) {
    if registration.is_registered() {
        channel.send_line("Hello world!");
    } else {
        registration.declare_invokable();
    }
}

export_plugin!(entry);
